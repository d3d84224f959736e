use anyhow::{Context, Result, bail};
use candle_core::{Device, Tensor};
use clap::{Parser, Subcommand};
use posejit_core::{
    events::{ResetEvent, ResetTerm, apply_reset_events},
    math::{
        axis_angle_from_quat, euler_xyz_from_quat, quat_angular_distance, quat_norm,
        quat_normalize,
    },
    sampler::sample_quat_within_rot_angle,
};
use posejit_sim::{InteractiveScene, RigidObject};
use rand::{SeedableRng, rngs::StdRng, seq::index};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Height at which every asset of a generated scene rests above its origin.
const SPAWN_HEIGHT: f32 = 0.5;

/// Smallest norm a user supplied reference orientation may have before normalization.
const MIN_REFERENCE_NORM: f32 = 1e-6;

#[derive(Parser, Debug)]
#[command(name = "posejit", about = "Constrained orientation sampling and root state resets")]
struct Args {
    /// Run on the first CUDA device instead of the CPU
    #[arg(long, global = true)]
    cuda: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Samples orientations around a reference and prints them as quaternions, Euler
    /// angles and rotation vectors
    Sample {
        #[arg(long, default_value_t = 10.)]
        max_angle_deg: f64,

        #[arg(long, default_value_t = 3)]
        num_samples: usize,

        /// Reference orientation as w x y z
        #[arg(
            long,
            num_args = 4,
            default_values_t = [1., 0., 0., 0.],
            allow_negative_numbers = true
        )]
        reference: Vec<f32>,
    },
    /// Resets a random subset of a generated scene with the events of a JSON config
    Reset {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value_t = 8)]
        num_envs: usize,

        #[arg(long, default_value_t = 3)]
        num_resets: usize,

        #[arg(long, default_value_t = 2.5)]
        env_spacing: f32,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn sample(
    device: &Device,
    max_angle_deg: f64,
    num_samples: usize,
    reference: &[f32],
) -> Result<()> {
    let reference = Tensor::from_slice(reference, reference.len(), device)?;
    let norm = quat_norm(&reference)?.to_vec1::<f32>()?[0];
    if !norm.is_finite() || norm < MIN_REFERENCE_NORM {
        bail!("reference orientation must be a finite, non-zero quaternion, got norm {norm}")
    }
    let reference = quat_normalize(&reference)?;
    let max_angle = max_angle_deg.to_radians();
    let sampled = sample_quat_within_rot_angle(&reference, max_angle, num_samples)?;
    info!(num_samples, max_angle, "sampled orientations");
    println!("reference:\n{reference}");
    println!("quaternions (w, x, y, z):\n{sampled}");
    println!("euler xyz:\n{}", euler_xyz_from_quat(&sampled)?);
    println!("axis angle:\n{}", axis_angle_from_quat(&sampled)?);
    let distances: Vec<f32> = quat_angular_distance(&reference, &sampled)?.to_vec1()?;
    let degrees: Vec<String> = distances
        .iter()
        .map(|d| format!("{:.3}", d.to_degrees()))
        .collect();
    println!("angular distance (deg): [{}]", degrees.join(", "));
    Ok(())
}

fn reset(
    device: &Device,
    config: &Path,
    num_envs: usize,
    num_resets: usize,
    env_spacing: f32,
    seed: Option<u64>,
) -> Result<()> {
    let content = fs::read_to_string(config)
        .with_context(|| format!("reading reset config {}", config.display()))?;
    let events: Vec<ResetEvent> = serde_json::from_str(&content)
        .with_context(|| format!("parsing reset config {}", config.display()))?;
    if num_resets > num_envs {
        bail!("cannot reset {num_resets} of {num_envs} environments")
    }

    let mut scene = InteractiveScene::new(num_envs, env_spacing, device)?;
    let asset_names: BTreeSet<&str> = events.iter().map(|e| e.asset_name()).collect();
    for name in asset_names {
        scene.add_asset(RigidObject::at_rest(
            name,
            num_envs,
            [0., 0., SPAWN_HEIGHT],
            device,
        )?)?;
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut env_ids: Vec<u32> = index::sample(&mut rng, num_envs, num_resets)
        .into_iter()
        .map(|idx| idx as u32)
        .collect();
    env_ids.sort_unstable();
    info!(?env_ids, events = events.len(), "applying reset events");
    apply_reset_events(&events, &mut scene, &env_ids)?;

    for event in &events {
        let name = event.asset_name();
        println!("{name} root state:\n{}", scene.asset(name)?.root_state(device)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();
    let device = if args.cuda {
        Device::new_cuda(0)?
    } else {
        Device::Cpu
    };
    match &args.command {
        Command::Sample {
            max_angle_deg,
            num_samples,
            reference,
        } => sample(&device, *max_angle_deg, *num_samples, reference),
        Command::Reset {
            config,
            num_envs,
            num_resets,
            env_spacing,
            seed,
        } => reset(&device, config, *num_envs, *num_resets, *env_spacing, *seed),
    }
}
