use std::{
    io::{stdout, Write},
    path::Path,
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use common::misc::human_duration;
use mesh_format::{spawn_load, ImportErrorKind, Registry};
use tracing::{error, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use args::Args;
use slicer::{mesh::Mesh, scene::Scene, JobInput, SliceError, SliceJob};

mod args;

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("slicer", args.log_level())
        .with_target("common", args.log_level())
        .with_target("mesh_format", args.log_level())
        .with_target("gcode_format", args.log_level());
    let format = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.slice_config()?;
    let input = if args.scene {
        JobInput::Scene(Scene::load(&args.input).map_err(SliceError::from)?)
    } else {
        JobInput::Mesh(load(&args.input)?)
    };

    let now = Instant::now();
    let unit = config.extrusion_unit();
    let job = SliceJob::new(config, input);
    let progress = job.progress();
    let output = args.output.clone();

    // The job runs on its own thread (the stages are multithreaded) so the
    // progress can be shown here.
    let handle = thread::spawn(move || job.write(output));
    while !handle.is_finished() {
        if progress.total() > 0 {
            print!(
                "\rLayer: {}/{}, {:.1}%",
                progress.completed() / 2,
                progress.total() / 2,
                progress.progress() * 100.0
            );
            stdout().flush()?;
        }
        thread::sleep(Duration::from_millis(100));
    }

    let result = handle
        .join()
        .map_err(|_| SliceError::Pool("slice thread panicked".into()))?;
    let output = result?;

    println!(
        "\nDone. {} layers, {:.1} {unit}, about {} of printing. Elapsed: {:.1}s",
        output.stats.layers,
        output.stats.extruded,
        human_duration(Duration::from_secs_f64(output.stats.print_time)),
        now.elapsed().as_secs_f32()
    );
    for diagnostic in output.diagnostics.iter() {
        println!(" \\ {diagnostic}");
    }

    Ok(())
}

/// Decodes the mesh on another thread while showing its progress.
fn load(path: &Path) -> Result<Mesh> {
    let (progress, handle) = spawn_load(path);
    while !handle.is_finished() {
        if progress.total() > 0 {
            print!("\rLoading: {:.1}%", progress.progress() * 100.0);
            stdout().flush()?;
        }
        thread::sleep(Duration::from_millis(50));
    }

    let result = handle
        .join()
        .map_err(|_| SliceError::Pool("mesh loading thread panicked".into()))?;
    let mesh = match result {
        Ok(mesh) => Mesh::from_import(mesh),
        Err(err) if err.kind() == ImportErrorKind::UnknownFormat => {
            let formats = Registry::default().formats().collect::<Vec<_>>().join(", ");
            return Err(SliceError::from(err))
                .with_context(|| format!("loading `{}`, supported formats: {formats}", path.display()));
        }
        Err(err) => {
            return Err(SliceError::from(err)).with_context(|| format!("loading `{}`", path.display()))
        }
    };

    println!(
        "\rLoaded `{}`. {{ vert: {}, face: {} }}",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Errors outside a slice job (bad arguments or config) exit with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SliceError>()
        .map_or(1, |x| x.exit_code() as u8)
}
