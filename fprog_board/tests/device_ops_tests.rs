//! Device operations through the simulation driver.
//!
//! Programs a small block, reads it back by address-counter increments and
//! checks that concurrent sequences on two cores never interleave.

use fprog_board::drivers::simulation::SimulationDriver;
use fprog_board::{Board, BoardError, BoardOp, DeviceOps, DriverRegistry};
use fprog_cmt::CoreId;
use fprog_common::config::BoardConfig;

fn sim_config() -> BoardConfig {
    BoardConfig {
        device_size: 0x1_0000,
        ..BoardConfig::default()
    }
}

fn sim_board() -> Board {
    let registry = DriverRegistry::with_builtin_drivers();
    let driver = registry.create_driver("simulation").expect("builtin driver");
    Board::new(driver, &sim_config()).expect("board init")
}

fn program(ops: &DeviceOps<'_>, base: u32, bytes: &[u8]) {
    ops.addr_set(base).unwrap();
    ops.wr_en(true);
    for &b in bytes {
        ops.data_set(b).unwrap();
        ops.addr_inc();
    }
    ops.wr_en(false);
}

#[test]
fn test_program_and_read_block() {
    let board = sim_board();
    let ops = DeviceOps::new(&board, &sim_config());
    ops.pwr_on(true);

    let image = [0x00, 0x11, 0x22, 0x33, 0xC3, 0x5A];
    program(&ops, 0x0200, &image);

    ops.addr_set(0x0200).unwrap();
    let mut read = Vec::new();
    for _ in 0..image.len() {
        read.push(ops.data_get().unwrap());
        ops.addr_inc();
    }
    assert_eq!(read, image);
    // Next byte untouched.
    assert_eq!(ops.data_get().unwrap(), 0xFF);

    let diag = board.diagnostics().unwrap();
    assert_eq!(diag.device_writes, image.len() as u64);
    assert_eq!(diag.device_reads, image.len() as u64 + 1);
}

#[test]
fn test_power_off_blocks_data_access() {
    let board = sim_board();
    let ops = DeviceOps::new(&board, &sim_config());
    ops.pwr_on(true);
    program(&ops, 0x10, &[0x42]);
    ops.pwr_on(false);

    ops.addr_set(0x10).unwrap();
    assert_eq!(ops.data_get(), Err(BoardError::NotPowered));
    ops.pwr_on(true);
    assert_eq!(ops.data_get().unwrap(), 0x42);
}

#[test]
fn test_address_wraps_to_device_size() {
    let board = sim_board();
    let ops = DeviceOps::new(&board, &sim_config());
    ops.pwr_on(true);
    program(&ops, 0x0_0007, &[0x77]);

    // 0x1_0007 aliases 0x0007 on a 64 KiB part.
    ops.addr_set(0x1_0007).unwrap();
    assert_eq!(ops.data_get().unwrap(), 0x77);
}

/// Latch `addr` and store `data` inside a single board op.
fn write_in_one_op(board: &Board, addr: u32, data: u8) {
    let mut tkn = board.op_start_blocking();
    let [low, mid, high, _] = addr.to_le_bytes();
    for (op, value) in [
        (BoardOp::AddrLowLd, low),
        (BoardOp::AddrMidLd, mid),
        (BoardOp::AddrHighLd, high),
    ] {
        tkn.dbus_write(value);
        tkn.op(op);
        std::thread::yield_now();
        tkn.op(BoardOp::None);
    }
    tkn.set_read_enable(false);
    tkn.set_write_enable(true);
    tkn.dbus_write(data);
    tkn.op(BoardOp::PrgmDevSel);
    tkn.op(BoardOp::None);
    tkn.set_write_enable(false);
}

#[test]
fn test_sequences_from_two_cores_do_not_interleave() {
    let board = sim_board();
    let ops = DeviceOps::new(&board, &sim_config());
    ops.pwr_on(true);

    std::thread::scope(|s| {
        for (core, base) in [(CoreId::Core0, 0x1000u32), (CoreId::Core1, 0x2000u32)] {
            let board = &board;
            s.spawn(move || {
                core.bind_current();
                for i in 0..64u32 {
                    write_in_one_op(board, base + i, (base >> 8) as u8 ^ i as u8);
                }
            });
        }
    });

    for base in [0x1000u32, 0x2000u32] {
        for i in 0..64u32 {
            ops.addr_set(base + i).unwrap();
            assert_eq!(ops.data_get().unwrap(), (base >> 8) as u8 ^ i as u8);
        }
    }
    assert_eq!(board.diagnostics().unwrap().device_writes, 128);
}

#[test]
fn test_direct_driver_board_has_no_owner_when_idle() {
    let board = Board::new(Box::new(SimulationDriver::new()), &sim_config()).unwrap();
    assert_eq!(board.owner(), None);
    let tkn = board.op_start().unwrap();
    assert_eq!(board.owner(), Some(CoreId::Core0));
    tkn.end();
    assert_eq!(board.owner(), None);
}
