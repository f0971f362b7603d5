use anyhow::{bail, Context, Result};
use pocketboy_dmg::{Dmg, RomWritePolicy};

/// Headless driver: run a ROM for a number of frames, then report what
/// the machine did (serial output, final CPU state). Useful for CPU
/// conformance ROMs and for debugging without a window.
struct Options {
    rom_path: String,
    boot_path: Option<String>,
    frames: u64,
    trace: bool,
    strict_rom: bool,
}

const USAGE: &str = "usage: pocketboy <rom.gb> [--boot <boot.bin>] [--frames <n>] [--trace] [--strict-rom]";

fn parse_args() -> Result<Options> {
    let mut opts = Options {
        rom_path: String::new(),
        boot_path: None,
        frames: 60,
        trace: false,
        strict_rom: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--boot" => {
                opts.boot_path = Some(args.next().context("--boot needs a path")?);
            }
            "--frames" => {
                let n = args.next().context("--frames needs a count")?;
                opts.frames = n.parse().with_context(|| format!("bad frame count '{n}'"))?;
            }
            "--trace" => opts.trace = true,
            "--strict-rom" => opts.strict_rom = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ if opts.rom_path.is_empty() => opts.rom_path = arg,
            other => bail!("unexpected argument '{other}'\n{USAGE}"),
        }
    }
    if opts.rom_path.is_empty() {
        bail!("no ROM given\n{USAGE}");
    }
    Ok(opts)
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = parse_args()?;

    let rom = std::fs::read(&opts.rom_path)
        .with_context(|| format!("reading ROM '{}'", opts.rom_path))?;
    log::info!("loaded '{}' ({} bytes)", opts.rom_path, rom.len());

    let mut dmg = Dmg::new();
    dmg.load_rom(rom);
    if opts.strict_rom {
        dmg.set_rom_write_policy(RomWritePolicy::Fault);
    }

    if let Some(boot_path) = &opts.boot_path {
        let image = std::fs::read(boot_path)
            .with_context(|| format!("reading boot image '{boot_path}'"))?;
        let image: [u8; 0x100] = image
            .as_slice()
            .try_into()
            .context("boot image must be exactly 256 bytes")?;
        dmg.load_boot_image(image);
        dmg.reset_to_boot_rom();
        log::info!("starting from boot image");
    }

    for frame in 0..opts.frames {
        if opts.trace {
            println!("{}", dmg.snapshot().conformance_line());
        }
        if let Err(err) = dmg.run_frame() {
            eprintln!("emulation halted in frame {frame}: {err}");
            eprintln!("{}", dmg.snapshot());
            break;
        }
    }

    let serial = dmg.serial_output();
    if !serial.is_empty() {
        println!("serial: {}", String::from_utf8_lossy(serial));
    }
    println!("{}", dmg.snapshot());
    Ok(())
}
