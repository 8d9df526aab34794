use structopt::StructOpt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use bayesnet::config::SamplerConfig;
use bayesnet::data::BattingTable;
use bayesnet::infer::{self, NetworkSamples};
use bayesnet::models::Baseball;

/// Posterior batting abilities of the 1970 players studied by Efron & Morris,
/// sampled by Metropolis-Hastings, Hamiltonian Monte Carlo and NUTS.
#[derive(StructOpt, Debug)]
#[structopt(name = "baseball")]
struct Opts {

    /// Tab-separated table with Hits and At-Bats columns
    #[structopt(long, parse(from_os_str), default_value = "data/efron-morris-75-data.tsv")]
    data : PathBuf,

    /// JSON sampler configuration
    #[structopt(long, parse(from_os_str))]
    config : Option<PathBuf>,

    /// Overrides the seed of the configuration file
    #[structopt(long)]
    seed : Option<u64>,

    #[structopt(long, default_value = "info")]
    log_level : tracing::Level,

    /// Shows a progress bar for each sampler
    #[structopt(long)]
    progress : bool

}

fn report(algorithm : &str, model : &Baseball, samples : &NetworkSamples) -> anyhow::Result<()> {
    let phi = samples.scalar_mean(model.phi, |v| v[0] )
        .ok_or_else(|| anyhow::anyhow!("{} produced no samples", algorithm))?;
    let kappa = samples.scalar_mean(model.k_base, |v| Baseball::kappa_of(v[0]) )
        .ok_or_else(|| anyhow::anyhow!("{} produced no samples", algorithm))?;
    println!("{} mean of phi: {}, Mean of kappa: {}", algorithm, phi, kappa);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::from_args();
    tracing_subscriber::fmt().with_max_level(opts.log_level).with_target(false).init();

    let mut config = match &opts.config {
        Some(path) => SamplerConfig::from_path(path)?,
        None => SamplerConfig::default()
    };
    config.seed = opts.seed.or(config.seed);
    config.progress |= opts.progress;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy()
    };

    let table = BattingTable::from_path(&opts.data)?;
    tracing::info!(n_players = table.len(), path = ?opts.data, "loaded batting table");
    let mut model = Baseball::build(&table.hits(), &table.at_bats())?;
    let latents = model.latents();

    model.shuffle(&mut rng)?;
    let mh = infer::metropolis_hastings(&mut model.net, &latents, &config, &mut rng)?
        .drop(config.metropolis.drop_count)
        .down_sample(config.metropolis.down_sample);
    report("MH", &model, &mh)?;

    model.shuffle(&mut rng)?;
    let hmc = infer::hamiltonian(&mut model.net, &latents, &config, &mut rng)?
        .drop(config.hamiltonian.drop_count);
    report("HMC", &model, &hmc)?;

    model.shuffle(&mut rng)?;
    let nuts = infer::nuts(&mut model.net, &latents, &config, &mut rng)?
        .drop(config.nuts.drop_count);
    report("NUTS", &model, &nuts)?;

    Ok(())
}
