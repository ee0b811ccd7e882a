//! Channel program interpreter.
//!
//! Runs orders starting at the OAR until a halt. Memory and DMA registers
//! are read through the machine on every order, never cached, because
//! programs store into and jump through their own memory.
//!
//! The only recoverable failure is a unit that isn't open: the status word
//! goes not-ready and the program carries on, usually to store the status
//! and halt. Everything else ends the run with an error.

use std::io::{Read, Seek, SeekFrom};

use log::{debug, trace, warn};

use super::geometry::{dma_register_index, dma_word_count, unit_index};
use super::order::{self, Order, Transfer};
use super::DiskController;
use crate::error::{PioError, PioResult};
use crate::machine::Machine;
use crate::store::{unit_file_name, DiskStore};

/// Status word of a ready controller.
pub const STATUS_READY: u16 = 0o100000;

/// Status word after a unit failed to open or an order found no unit.
pub const STATUS_NOT_READY: u16 = 0o100001;

/// Controller registers for one channel program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    /// Order Address Register.
    pub oar: u16,
    pub status: u16,
    /// Unit index from the last select order.
    pub unit: Option<u8>,
    /// DMA channel used for transfers.
    pub dma_channel: u16,
    /// Number of DMA channels minus one, as given by the select order.
    pub dma_channels: u8,
}

impl ChannelState {
    pub fn new(oar: u16) -> Self {
        Self {
            oar,
            status: STATUS_READY,
            unit: None,
            dma_channel: 0,
            dma_channels: 0,
        }
    }

    /// Condition tested by an execute-if order.
    ///
    /// The controller never satisfies it, so flagged orders are always
    /// stepped over.
    pub fn condition_met(&self, _word0: u16) -> bool {
        false
    }

    fn not_ready(&mut self) {
        self.status = STATUS_NOT_READY;
    }
}

/// How a channel program ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    /// OAR at the halt order.
    pub oar: u16,
    pub status: u16,
    pub unit: Option<u8>,
    /// Orders executed, including the halt.
    pub executed: usize,
    /// Execute-if orders stepped over.
    pub skipped: usize,
}

impl<S: DiskStore> DiskController<S> {
    /// Run the channel program at `oar` to completion.
    pub fn run_channel_program(
        &mut self,
        machine: &mut dyn Machine,
        device: u8,
        oar: u16,
    ) -> PioResult<ChannelOutcome> {
        let mut state = ChannelState::new(oar);
        let mut executed = 0;
        let mut skipped = 0;

        loop {
            let at = state.oar;
            let words = [
                machine.read_word(at),
                machine.read_word(at.wrapping_add(1)),
                machine.read_word(at.wrapping_add(2)),
            ];
            debug!("'{:o}: '{:o} '{:o} '{:o}", at, words[0], words[1], words[2]);

            if order::is_conditional(words[0]) && !state.condition_met(words[0]) {
                let size = order::order_len(order::order_code(words[0]));
                trace!("execute-if order at '{at:o} stepped over");
                state.oar = at.wrapping_add(size);
                skipped += 1;
                continue;
            }

            let order =
                Order::decode(words).map_err(|order| PioError::UnrecognizedOrder { order, oar: at })?;
            debug!(" {order}");
            executed += 1;

            match order {
                Order::Halt => {
                    debug!(" channel program halt at '{at:o}");
                    return Ok(ChannelOutcome {
                        oar: at,
                        status: state.status,
                        unit: state.unit,
                        executed,
                        skipped,
                    });
                }
                Order::Format(t) => self.unimplemented_transfer(machine, &mut state, "format", t),
                Order::Write(t) => self.unimplemented_transfer(machine, &mut state, "write", t),
                Order::Read(t) => self.read(machine, &mut state, t)?,
                // Seek latency isn't modelled; reads carry their own track
                Order::Seek { .. } => {}
                Order::SelectUnit { unit_field } => self.select_unit(&mut state, device, unit_field),
                Order::Stall => {}
                Order::StoreStatus { addr } => {
                    debug!(" store status='{:o} to '{addr:o}", state.status);
                    machine.write_word(addr, state.status);
                }
                Order::StoreOar { addr } => machine.write_word(addr, at),
                Order::SelectDma {
                    channel_count,
                    channel,
                } => {
                    state.dma_channels = channel_count;
                    state.dma_channel = channel;
                }
                Order::Interrupt { vector } => {
                    return Err(PioError::InterruptOrder { vector, oar: at });
                }
                Order::Jump { target } => {
                    state.oar = target;
                    continue;
                }
            }

            state.oar = at.wrapping_add(order.size());
        }
    }

    fn select_unit(&mut self, state: &mut ChannelState, device: u8, unit_field: u8) {
        let unit = unit_index(unit_field);
        let name = unit_file_name(device, unit);
        debug!(" select unit {unit}, filename {name}");
        state.unit = Some(unit);
        if !self.slot.select(&mut self.store, &name) {
            state.not_ready();
        }
    }

    fn log_dma(&self, machine: &dyn Machine, state: &ChannelState) {
        let reg = dma_register_index(state.dma_channel);
        trace!(
            " DMA channels: nch-1={}, ['{:o}]='{:o}, ['{:o}]='{:o}, nwords={}",
            state.dma_channels,
            state.dma_channel,
            machine.dma(reg),
            state.dma_channel.wrapping_add(1),
            machine.dma(reg + 1),
            dma_word_count(machine.dma(reg))
        );
    }

    fn unimplemented_transfer(
        &mut self,
        machine: &dyn Machine,
        state: &mut ChannelState,
        what: &str,
        _t: Transfer,
    ) {
        self.log_dma(machine, state);
        if !self.slot.is_open() {
            warn!(" unit not selected or not ready");
            state.not_ready();
        } else {
            warn!(" {what} order not implemented");
        }
    }

    fn read(
        &mut self,
        machine: &mut dyn Machine,
        state: &mut ChannelState,
        t: Transfer,
    ) -> PioResult<()> {
        self.log_dma(machine, state);
        let offset = self
            .geometry
            .byte_offset(t.track, t.head, t.record)
            .ok_or_else(|| {
                PioError::Config(format!(
                    "track {} head {} record {} is outside {:?}",
                    t.track, t.head, t.record, self.geometry
                ))
            })?;

        let Some((name, image)) = self.slot.image_mut() else {
            warn!(" unit not selected or not ready");
            state.not_ready();
            return Ok(());
        };

        let reg = dma_register_index(state.dma_channel);
        let count = machine.dma(reg);
        let nwords = dma_word_count(count);
        if nwords < 0 {
            return Err(PioError::InvalidDmaCount {
                channel: state.dma_channel,
                register: count,
            });
        }
        let nwords = nwords as u16;
        let addr = machine.dma(reg + 1);

        debug!(
            " record={}, byte offset={offset}",
            self.geometry
                .record_number(t.track, t.head, t.record)
                .unwrap_or_default()
        );
        image.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; nwords as usize * 2];
        let mut got = 0;
        while got < buf.len() {
            match image.read(&mut buf[got..])? {
                0 => break,
                n => got += n,
            }
        }
        if got != buf.len() {
            return Err(PioError::ShortRead {
                file: name.to_string(),
                expected: buf.len(),
                got,
            });
        }

        for (i, pair) in buf.chunks_exact(2).enumerate() {
            let word = u16::from_be_bytes([pair[0], pair[1]]);
            machine.write_word(addr.wrapping_add(i as u16), word);
        }
        machine.set_dma(reg, 0);
        machine.set_dma(reg + 1, addr.wrapping_add(nwords));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::geometry::{dma_count_register, DiskGeometry};
    use crate::machine::CoreMachine;
    use crate::store::{DiskImage, MemoryStore};
    use std::io::{self, Cursor};
    use std::sync::{Arc, Mutex};

    const PROG: u16 = 0o1000;
    const BUF: u16 = 0o4000;
    const DEV: u8 = 0o26;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Image that records when it is closed.
    struct TrackedImage {
        name: String,
        data: Cursor<Vec<u8>>,
        log: Log,
    }

    impl Read for TrackedImage {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for TrackedImage {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.data.seek(pos)
        }
    }

    impl Drop for TrackedImage {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("close {}", self.name));
        }
    }

    /// Store that records every open attempt.
    struct TrackedStore {
        inner: MemoryStore,
        log: Log,
    }

    impl DiskStore for TrackedStore {
        fn open_unit(&mut self, name: &str) -> io::Result<Box<dyn DiskImage>> {
            self.log.lock().unwrap().push(format!("open {name}"));
            let mut image = self.inner.open_unit(name)?;
            let mut data = Vec::new();
            image.read_to_end(&mut data)?;
            Ok(Box::new(TrackedImage {
                name: name.to_string(),
                data: Cursor::new(data),
                log: self.log.clone(),
            }))
        }
    }

    fn tracked(images: &[&str]) -> (DiskController<TrackedStore>, Log) {
        let log: Log = Arc::default();
        let inner = MemoryStore::with_images(images.iter().map(|n| (*n, vec![0u8; 64])));
        let store = TrackedStore {
            inner,
            log: log.clone(),
        };
        (DiskController::new(store), log)
    }

    fn load(m: &mut CoreMachine, orders: &[Order]) {
        let mut addr = PROG;
        for order in orders {
            let words = order.encode();
            m.load_image(addr, &words);
            addr += words.len() as u16;
        }
    }

    fn run<S: DiskStore>(
        disk: &mut DiskController<S>,
        m: &mut CoreMachine,
    ) -> PioResult<ChannelOutcome> {
        disk.run_channel_program(m, DEV, PROG)
    }

    fn image_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_select_same_unit_opens_once() {
        let (mut disk, log) = tracked(&["dev26u0"]);
        let mut m = CoreMachine::new();
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::SelectUnit { unit_field: 0b0001 },
                Order::Halt,
            ],
        );

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.status, STATUS_READY);
        assert_eq!(outcome.unit, Some(0));
        assert_eq!(*log.lock().unwrap(), vec!["open dev26u0"]);

        // The image stays open for the next program
        run(&mut disk, &mut m).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["open dev26u0"]);
        assert_eq!(disk.open_unit(), Some("dev26u0"));
    }

    #[test]
    fn test_reselect_closes_before_open() {
        let (mut disk, log) = tracked(&["dev26u0"]);
        let mut m = CoreMachine::new();
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::SelectUnit { unit_field: 0b0010 },
                Order::StoreStatus { addr: 0o3000 },
                Order::Halt,
            ],
        );

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.status, STATUS_NOT_READY);
        assert_eq!(m.read_word(0o3000), STATUS_NOT_READY);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["open dev26u0", "close dev26u0", "open dev26u1"]
        );
        assert_eq!(disk.open_unit(), None);
    }

    #[test]
    fn test_unit_field_1000_is_unit_3() {
        let (mut disk, log) = tracked(&["dev26u3"]);
        let mut m = CoreMachine::new();
        load(&mut m, &[Order::SelectUnit { unit_field: 0b1000 }, Order::Halt]);

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.unit, Some(3));
        assert_eq!(outcome.status, STATUS_READY);
        assert_eq!(*log.lock().unwrap(), vec!["open dev26u3"]);
    }

    #[test]
    fn test_read_without_unit_is_not_ready() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        m.set_dma(0, dma_count_register(4));
        m.set_dma(1, BUF);
        load(
            &mut m,
            &[
                Order::Read(Transfer::default()),
                Order::StoreStatus { addr: 0o3000 },
                Order::Halt,
            ],
        );

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.status, STATUS_NOT_READY);
        assert_eq!(m.read_word(0o3000), STATUS_NOT_READY);
        // No transfer happened
        assert_eq!(m.dma(0), dma_count_register(4));
        assert_eq!(m.dma(1), BUF);
    }

    #[test]
    fn test_read_transfers_record() {
        let geometry = DiskGeometry::default();
        let offset = geometry.byte_offset(1, 2, 3).unwrap() as usize;
        let image = image_of(offset + 2080);
        let mut disk = DiskController::new(MemoryStore::with_images([("dev26u1", image.clone())]));
        let mut m = CoreMachine::new();
        m.set_dma(4, dma_count_register(10));
        m.set_dma(5, BUF);
        load(
            &mut m,
            &[
                Order::SelectDma {
                    channel_count: 0,
                    channel: 2,
                },
                Order::SelectUnit { unit_field: 0b0010 },
                Order::Seek {
                    track: 1,
                    restore: false,
                    clear: false,
                },
                Order::Read(Transfer {
                    recsize: 0,
                    track: 1,
                    head: 2,
                    record: 3,
                }),
                Order::Halt,
            ],
        );

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.status, STATUS_READY);
        assert_eq!(outcome.executed, 5);
        for i in 0..10 {
            let expected = u16::from_be_bytes([image[offset + 2 * i], image[offset + 2 * i + 1]]);
            assert_eq!(m.read_word(BUF + i as u16), expected);
        }
        assert_eq!(m.read_word(BUF + 10), 0);
        assert_eq!(m.dma(4), 0);
        assert_eq!(m.dma(5), BUF + 10);
    }

    #[test]
    fn test_short_read_is_fatal() {
        let mut disk = DiskController::new(MemoryStore::with_images([("dev26u0", vec![1u8; 100])]));
        let mut m = CoreMachine::new();
        m.set_dma(0, dma_count_register(100));
        m.set_dma(1, BUF);
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::Read(Transfer::default()),
                Order::Halt,
            ],
        );

        let err = run(&mut disk, &mut m).unwrap_err();
        assert!(matches!(
            err,
            PioError::ShortRead {
                expected: 200,
                got: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_conditional_orders_only_advance_oar() {
        let mut disk = DiskController::new(MemoryStore::with_images([("dev26u0", image_of(2080))]));
        let mut m = CoreMachine::new();
        m.set_dma(0, dma_count_register(2));
        m.set_dma(1, BUF);

        let mut prog = Vec::new();
        prog.extend(Order::SelectDma { channel_count: 3, channel: 2 }.encode_with(true));
        prog.extend(Order::SelectUnit { unit_field: 0b0001 }.encode_with(true));
        prog.extend(Order::Read(Transfer::default()).encode_with(true));
        prog.extend(Order::StoreStatus { addr: 0o3000 }.encode_with(true));
        prog.extend(Order::Jump { target: 0o7000 }.encode_with(true));
        prog.extend(Order::Interrupt { vector: 0o63 }.encode_with(true));
        prog.extend(Order::Halt.encode_with(true));
        let halt_at = PROG + prog.len() as u16;
        prog.extend(Order::Halt.encode());
        m.load_image(PROG, &prog);

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.oar, halt_at);
        assert_eq!(outcome.skipped, 7);
        assert_eq!(outcome.executed, 1);
        assert_eq!(outcome.status, STATUS_READY);
        assert_eq!(outcome.unit, None);
        assert_eq!(disk.open_unit(), None);
        assert_eq!(m.read_word(0o3000), 0);
        assert_eq!(m.read_word(BUF), 0);
        assert_eq!(m.dma(0), dma_count_register(2));
        assert_eq!(m.dma(1), BUF);
    }

    #[test]
    fn test_jump_then_halt() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        load(
            &mut m,
            &[
                Order::Jump { target: 0o2000 },
                Order::StoreStatus { addr: 0o3000 },
                Order::Halt,
            ],
        );
        m.load_image(0o2000, &Order::Halt.encode());

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.oar, 0o2000);
        assert_eq!(outcome.executed, 2);
        assert_eq!(m.read_word(0o3000), 0);
    }

    #[test]
    fn test_store_oar() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        load(
            &mut m,
            &[
                Order::Stall,
                Order::StoreOar { addr: 0o3001 },
                Order::Halt,
            ],
        );

        run(&mut disk, &mut m).unwrap();
        assert_eq!(m.read_word(0o3001), PROG + 2);
    }

    #[test]
    fn test_program_sees_its_own_stores() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        // The status store overwrites the jump target
        load(
            &mut m,
            &[
                Order::StoreStatus { addr: PROG + 3 },
                Order::Jump { target: 0o7777 },
            ],
        );
        m.load_image(STATUS_READY, &Order::Halt.encode());

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.oar, STATUS_READY);
    }

    #[test]
    fn test_unrecognized_order_is_fatal() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        m.load_image(PROG, &[0o010000, 0, 0]);
        let before = m.words(0, 0o10000).to_vec();

        let err = run(&mut disk, &mut m).unwrap_err();
        assert!(matches!(
            err,
            PioError::UnrecognizedOrder { order: 1, oar: PROG }
        ));
        assert_eq!(m.words(0, 0o10000), before.as_slice());
    }

    #[test]
    fn test_interrupt_order_is_fatal() {
        let mut disk = DiskController::new(MemoryStore::new());
        let mut m = CoreMachine::new();
        load(&mut m, &[Order::Interrupt { vector: 0o63 }, Order::Halt]);

        let err = run(&mut disk, &mut m).unwrap_err();
        assert!(matches!(
            err,
            PioError::InterruptOrder {
                vector: 0o63,
                oar: PROG
            }
        ));
    }

    #[test]
    fn test_format_and_write_only_log() {
        let mut disk = DiskController::new(MemoryStore::with_images([("dev26u0", image_of(2080))]));
        let mut m = CoreMachine::new();
        m.set_dma(0, dma_count_register(4));
        m.set_dma(1, BUF);
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::Format(Transfer::default()),
                Order::Write(Transfer::default()),
                Order::StoreStatus { addr: 0o3000 },
                Order::Halt,
            ],
        );

        let outcome = run(&mut disk, &mut m).unwrap();
        assert_eq!(outcome.status, STATUS_READY);
        assert_eq!(m.read_word(0o3000), STATUS_READY);
        assert_eq!(m.dma(0), dma_count_register(4));
        assert_eq!(m.read_word(BUF), 0);
    }

    #[test]
    fn test_positive_dma_count_is_fatal() {
        let mut disk = DiskController::new(MemoryStore::with_images([("dev26u0", image_of(2080))]));
        let mut m = CoreMachine::new();
        m.set_dma(0, 0o100);
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::Read(Transfer::default()),
                Order::Halt,
            ],
        );
        assert!(matches!(
            run(&mut disk, &mut m),
            Err(PioError::InvalidDmaCount { channel: 0, register: 0o100 })
        ));
    }

    #[test]
    fn test_release_and_drop_close_image() {
        let (mut disk, log) = tracked(&["dev26u0"]);
        let mut m = CoreMachine::new();
        load(&mut m, &[Order::SelectUnit { unit_field: 0b0001 }, Order::Halt]);

        run(&mut disk, &mut m).unwrap();
        disk.release();
        assert_eq!(disk.open_unit(), None);
        assert_eq!(*log.lock().unwrap(), vec!["open dev26u0", "close dev26u0"]);

        run(&mut disk, &mut m).unwrap();
        drop(disk);
        assert_eq!(
            log.lock().unwrap().last().map(String::as_str),
            Some("close dev26u0")
        );
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_read_outside_geometry_is_fatal() {
        let geometry = DiskGeometry {
            heads: u32::MAX,
            sectors_per_track: u32::MAX,
            sector_bytes: u32::MAX,
        };
        let store = MemoryStore::with_images([("dev26u0", image_of(2080))]);
        let mut disk = DiskController::with_geometry(store, geometry);
        let mut m = CoreMachine::new();
        m.set_dma(0, dma_count_register(1));
        m.set_dma(1, BUF);
        load(
            &mut m,
            &[
                Order::SelectUnit { unit_field: 0b0001 },
                Order::Read(Transfer {
                    recsize: 0,
                    track: 1023,
                    head: 63,
                    record: 255,
                }),
                Order::Halt,
            ],
        );

        assert!(matches!(run(&mut disk, &mut m), Err(PioError::Config(_))));
        assert_eq!(m.read_word(BUF), 0);
        assert_eq!(m.dma(0), dma_count_register(1));
    }
}
