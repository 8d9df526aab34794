use structopt::StructOpt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use bayesnet::config::SamplerConfig;
use bayesnet::infer;
use bayesnet::models::EightSchools;

/// Posterior of the eight schools hierarchical model, sampled with NUTS.
#[derive(StructOpt, Debug)]
#[structopt(name = "gelman-schools")]
struct Opts {

    /// JSON sampler configuration
    #[structopt(long, parse(from_os_str))]
    config : Option<PathBuf>,

    #[structopt(long)]
    seed : Option<u64>,

    #[structopt(long, default_value = "info")]
    log_level : tracing::Level,

    #[structopt(long)]
    progress : bool

}

fn main() -> anyhow::Result<()> {
    let opts = Opts::from_args();
    tracing_subscriber::fmt().with_max_level(opts.log_level).with_target(false).init();

    let mut config = match &opts.config {
        Some(path) => SamplerConfig::from_path_over(path, &SamplerConfig::eight_schools())?,
        None => SamplerConfig::eight_schools()
    };
    config.seed = opts.seed.or(config.seed);
    config.progress |= opts.progress;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy()
    };

    let mut model = EightSchools::schools()?;
    let latents = model.latents();
    let samples = infer::nuts(&mut model.net, &latents, &config, &mut rng)?
        .drop(config.nuts.drop_count);

    let mean_of = |id| samples.mean(id).ok_or_else(|| anyhow::anyhow!("NUTS produced no samples") );
    let mu = mean_of(model.mu)?;
    let tau = mean_of(model.tau)?;
    let eta = mean_of(model.eta)?;
    println!("NUTS mean of mu: {}, Mean of tau: {}", mu[0], tau[0]);

    // theta is deterministic, so its draws are rebuilt from the sampled latents.
    let (mu_draws, tau_draws, eta_draws) = match (samples.get(model.mu), samples.get(model.tau), samples.get(model.eta)) {
        (Some(m), Some(t), Some(e)) => (m, t, e),
        _ => anyhow::bail!("NUTS produced no samples")
    };
    let mut theta = nalgebra::DVector::zeros(eta.nrows());
    for ((m, t), e) in mu_draws.iter().zip(tau_draws.iter()).zip(eta_draws.iter()) {
        theta += e * t[0] + nalgebra::DVector::from_element(e.nrows(), m[0]);
    }
    theta /= samples.len() as f64;
    for (j, th) in theta.iter().enumerate() {
        println!("Mean of theta[{}]: {}", j, th);
    }
    Ok(())
}
