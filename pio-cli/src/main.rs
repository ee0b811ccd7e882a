//! PIO CLI - Drive the I/O subsystem from the command line.
//!
//! Loads a memory image, then executes a list of I/O instruction words
//! against the configured device map, the way the CPU would. Each word is
//! stored in memory at `--origin` + 2N before it runs, leaving a gap word
//! after it; a `JMP *-1` ('3776) in the image at that gap makes the
//! instruction a blocking one.
//!
//! Usage:
//!   pio [options] <octal instruction words...>
//!
//! Examples:
//!   pio --image boot.bin --at 1000 -A 1000 171726   # Run the disk channel program at '1000
//!   pio -A 110 170004                              # OTA '0004: write 'H' to the console
//!   pio --config machine.json --trace 131620        # INA '1620: read sense switches

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info};
use tokio::sync::mpsc as tokio_mpsc;

use pio_core::{
    load_config, CoreMachine, Machine, MachineConfig, PioError, PioInstruction, Terminal,
};

/// Programmed-I/O runner
#[derive(Parser, Debug)]
#[command(name = "pio")]
#[command(about = "Execute I/O instructions and disk channel programs")]
struct Args {
    /// Machine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding disk unit images (overrides the configuration)
    #[arg(short, long)]
    disk_dir: Option<PathBuf>,

    /// Big-endian memory image to load
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Octal load address of the image
    #[arg(long, default_value = "0", value_parser = parse_octal)]
    at: u16,

    /// Octal address of the first instruction. Instruction N is stored at
    /// ORIGIN + 2N; the word after it is left as loaded from the image, so
    /// an image can place a retry loop there
    #[arg(long, default_value = "100", value_parser = parse_octal)]
    origin: u16,

    /// Octal initial value of A
    #[arg(short = 'A', long = "a-reg", default_value = "0", value_parser = parse_octal)]
    a: u16,

    /// Octal initial value of the keys register
    #[arg(short, long, default_value = "0", value_parser = parse_octal)]
    keys: u16,

    /// Octal address to dump after the run, as ADDR or ADDR:COUNT
    #[arg(long)]
    dump: Option<String>,

    /// Enable dispatch and channel program tracing
    #[arg(short, long)]
    trace: bool,

    /// I/O instruction words to execute, in octal
    #[arg(required = true, value_parser = parse_octal)]
    instructions: Vec<u16>,
}

fn parse_octal(s: &str) -> Result<u16, String> {
    let digits = s.strip_prefix('\'').unwrap_or(s);
    u16::from_str_radix(digits, 8).map_err(|e| format!("invalid octal word {s:?}: {e}"))
}

fn parse_dump(s: &str) -> Result<(u16, usize), String> {
    match s.split_once(':') {
        Some((addr, count)) => {
            let count = count
                .parse()
                .map_err(|e| format!("invalid dump count {count:?}: {e}"))?;
            Ok((parse_octal(addr)?, count))
        }
        None => Ok((parse_octal(s)?, 8)),
    }
}

/// Channel-based terminal fed by the key reader task.
struct ChannelTerminal {
    /// Receiver for keyboard input
    key_rx: mpsc::Receiver<u8>,
    /// Key received by a poll but not read yet
    pending: Option<u8>,
}

impl ChannelTerminal {
    fn new(key_rx: mpsc::Receiver<u8>) -> Self {
        Self {
            key_rx,
            pending: None,
        }
    }
}

impl Terminal for ChannelTerminal {
    fn write_byte(&mut self, ch: u8) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        match ch {
            // Raw mode doesn't translate LF
            0x0A => handle.write_all(b"\r\n")?,
            0x0D => {}
            _ => handle.write_all(&[ch])?,
        }
        handle.flush()
    }

    fn poll_input(&mut self, timeout: Duration) -> bool {
        if self.pending.is_some() {
            return true;
        }
        self.pending = self.key_rx.recv_timeout(timeout).ok();
        self.pending.is_some()
    }

    fn read_byte(&mut self, blocking: bool) -> std::io::Result<Option<u8>> {
        if let Some(ch) = self.pending.take() {
            return Ok(Some(ch));
        }
        if blocking {
            // A closed channel means no more input will ever come
            Ok(self.key_rx.recv().ok())
        } else {
            Ok(self.key_rx.try_recv().ok())
        }
    }
}

/// Translate crossterm key events to console character codes.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return Some(upper as u8 - 64);
            }
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(8),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        _ => None,
    }
}

fn build_config(args: &Args) -> Result<MachineConfig, PioError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MachineConfig::default(),
    };
    if let Some(dir) = &args.disk_dir {
        config.disk_dir = dir.clone();
    }
    Ok(config)
}

/// Run the instruction list. Returns the machine for the final report.
/// A word that isn't an I/O instruction stops the run.
fn run(
    args: &Args,
    config: &MachineConfig,
    terminal: ChannelTerminal,
) -> Result<CoreMachine, PioError> {
    let mut bus = config.build_bus(terminal)?;
    let mut machine = CoreMachine::new();

    if let Some(path) = &args.image {
        let bytes = std::fs::read(path)?;
        info!(
            "loaded {} ({} words) at '{:o}",
            path.display(),
            bytes.len().div_ceil(2),
            args.at
        );
        machine.load_bytes(args.at, &bytes);
    }
    machine.set_a(args.a);
    machine.set_keys(args.keys);

    for (i, &word) in args.instructions.iter().enumerate() {
        let ins = PioInstruction::decode(word).ok_or(PioError::NotIoInstruction(word))?;
        let pc = args.origin.wrapping_add((i as u16).wrapping_mul(2));
        machine.write_word(pc, word);
        let rp = pc.wrapping_add(1);
        machine.set_rp(rp);
        bus.dispatch(&mut machine, ins.class, ins.func, ins.device)?;
        let skipped = machine.rp() != rp;
        debug!("'{pc:o} {ins}: A='{:06o} skip={skipped}", machine.a());
    }
    Ok(machine)
}

fn report(machine: &CoreMachine, dump: Option<(u16, usize)>) {
    eprintln!(
        "A='{:06o} keys='{:06o} rp='{:06o}",
        machine.a(),
        machine.keys(),
        machine.rp()
    );
    if let Some((addr, count)) = dump {
        for (row, chunk) in machine.words(addr, count).chunks(8).enumerate() {
            let line: Vec<String> = chunk.iter().map(|w| format!("{w:06o}")).collect();
            let at = addr.wrapping_add((row as u16).wrapping_mul(8));
            eprintln!("'{at:06o}: {}", line.join(" "));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.trace {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let dump = args.dump.as_deref().map(parse_dump).transpose()?;
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Create channel for keyboard input
    let (key_tx, key_rx) = mpsc::channel::<u8>();

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = tokio_mpsc::channel::<()>(1);

    let terminal = ChannelTerminal::new(key_rx);

    // Enable raw mode (gracefully handle non-TTY)
    let raw_mode_enabled = enable_raw_mode().is_ok();

    // Spawn the run in a blocking task
    let run_handle = tokio::task::spawn_blocking(move || run(&args, &config, terminal));

    // Spawn terminal input reader
    let input_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if let Some(ch) = translate_key(key_event.code, key_event.modifiers) {
                                if key_tx.send(ch).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    let result = run_handle.await?;

    // Signal input handler to stop
    let _ = shutdown_tx.send(()).await;
    let _ = input_handle.await;

    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    match result {
        Ok(machine) => {
            report(&machine, dump);
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            eprintln!("\nError: {e}");
            std::process::exit(1);
        }
    }
}
