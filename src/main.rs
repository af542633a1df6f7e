//! Headless runner: seed a preset, tick for a while, report stats.
//!
//! Usage: `voxlife [preset] [ticks] [grid_size]`
//!   preset     petri | gradient | arena   (default petri)
//!   ticks      number of simulation ticks (default 500)
//!   grid_size  dense grid edge, multiple of 4 (default: auto tier)

use voxlife::prelude::*;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let preset = args
        .next()
        .and_then(|s| Preset::from_name(&s))
        .unwrap_or(Preset::PetriDish);
    let ticks: u32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(500);
    let grid_size: Option<u32> = args.next().and_then(|s| s.parse().ok());

    let gpu = match GpuContext::new_blocking() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let engine = match grid_size {
        Some(gs) => Engine::try_new(&gpu.device, &gpu.queue, gs),
        None => Engine::auto(&gpu.device, &gpu.queue, &gpu.adapter_info, &gpu.limits),
    };
    let mut engine = match engine {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!(
        "voxlife: {}\u{00b3} grid{}, preset {:?}, {} ticks",
        engine.grid_size(),
        if engine.is_sparse() { " (sparse)" } else { "" },
        preset,
        ticks,
    );

    let seed = preset.commands(engine.grid_size());
    engine.tick(&gpu.device, &gpu.queue, &seed);

    for _ in 1..ticks {
        engine.tick(&gpu.device, &gpu.queue, &[]);
        engine.poll_readbacks(&gpu.device);
        if let Some(stats) = engine.try_take_stats() {
            println!(
                "tick {:>6}  population {:>7}  species {:>3}  total energy {:>10}  max {:>5}",
                engine.tick_count(),
                stats.population,
                stats.species_count,
                stats.total_energy,
                stats.max_energy,
            );
        }
    }

    // Let the last readback land before exiting.
    for _ in 0..100 {
        engine.poll_readbacks(&gpu.device);
        if let Some(stats) = engine.try_take_stats() {
            println!(
                "final: population {} across {} species",
                stats.population, stats.species_count
            );
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
