use nalgebra::DVector;
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use bayesnet::*;
use bayesnet::config::SamplerConfig;
use bayesnet::data::BattingTable;
use bayesnet::infer;
use bayesnet::models::{Baseball, EightSchools};

const H : f64 = 1E-6;

fn numeric_gradient(net : &mut BayesNet, id : VertexId) -> DVector<f64> {
    let x0 = net.value(id).unwrap().clone();
    let mut out = DVector::zeros(x0.nrows());
    for i in 0..x0.nrows() {
        let mut x = x0.clone();
        x[i] = x0[i] + H;
        net.set_and_cascade(id, x.clone()).unwrap();
        let up = net.log_prob().unwrap();
        x[i] = x0[i] - H;
        net.set_and_cascade(id, x).unwrap();
        let down = net.log_prob().unwrap();
        out[i] = (up - down) / (2.0 * H);
    }
    net.set_and_cascade(id, x0).unwrap();
    out
}

fn assert_gradient_matches(net : &mut BayesNet, latents : &[VertexId]) {
    let (_, grads) = net.log_prob_gradient(latents).unwrap();
    for id in latents {
        let expected = numeric_gradient(net, *id);
        let found = &grads[id];
        for i in 0..expected.nrows() {
            let tol = 1E-4 * expected[i].abs().max(1.0);
            assert!((found[i] - expected[i]).abs() < tol, "vertex {} at {}: {} vs {}", id, i, found[i], expected[i]);
        }
    }
}

// p ~ Beta(2, 2); k ~ Binomial(p, 100) observed at 20. The posterior is Beta(22, 82).
fn conjugate(custom_gradient : bool) -> (BayesNet, VertexId, VertexId) {
    let mut net = BayesNet::new();
    let p = net.beta(1, 2.0, 2.0).unwrap();
    let k = net.binomial(1, p, 100.0).unwrap();
    net.observe(k, DVector::from_element(1, 20.0)).unwrap();
    if custom_gradient {
        net.override_d_log_prob(k, FixedTrialsBinomial).unwrap();
    }
    (net, p, k)
}

const CONJUGATE_MEAN : f64 = 22.0 / 104.0;

#[test]
fn baseball_gradient() {
    let mut model = Baseball::build(&[18, 17, 12, 9, 7], &[45, 45, 45, 45, 45]).unwrap();
    model.net.set_and_cascade(model.phi, DVector::from_element(1, 0.3)).unwrap();
    model.net.set_and_cascade(model.k_base, DVector::from_element(1, 0.8)).unwrap();
    model.net.set_and_cascade(model.thetas, DVector::from_column_slice(&[0.35, 0.3, 0.28, 0.22, 0.18])).unwrap();
    let latents = model.latents();
    assert_gradient_matches(&mut model.net, &latents);
}

#[test]
fn eight_schools_gradient() {
    let mut model = EightSchools::schools().unwrap();
    model.net.set_and_cascade(model.eta, DVector::from_column_slice(&[0.3, -0.1, 0.5, 1.2, -0.7, 0.0, 0.9, -1.1])).unwrap();
    model.net.set_and_cascade(model.mu, DVector::from_element(1, 4.0)).unwrap();
    model.net.set_and_cascade(model.tau, DVector::from_element(1, 3.5)).unwrap();
    let latents = model.latents();
    assert_gradient_matches(&mut model.net, &latents);
}

#[test]
fn zero_gradient_at_likelihood_optimum() {
    // With a flat prior the gradient is that of the likelihood alone.
    let mut net = BayesNet::new();
    let p = net.uniform(1, 0.0, 1.0).unwrap();
    let k = net.binomial(1, p, 100.0).unwrap();
    net.observe(k, DVector::from_element(1, 20.0)).unwrap();
    net.override_d_log_prob(k, FixedTrialsBinomial).unwrap();
    net.set_value(p, DVector::from_element(1, 0.2)).unwrap();
    let (_, grads) = net.log_prob_gradient(&[p]).unwrap();
    assert_abs_diff_eq!(grads[&p][0], 0.0, epsilon = 1E-9);
}

#[test]
fn stock_binomial_has_no_gradient() {
    let mut rng = StdRng::seed_from_u64(1);
    let (mut net, p, k) = conjugate(false);
    let res = infer::hamiltonian(&mut net, &[p], &SamplerConfig::default(), &mut rng);
    assert_eq!(res.unwrap_err(), ModelError::UnsupportedGradient { vertex : k, distribution : "Binomial" });
}

#[test]
fn custom_gradient_requires_constant_trials() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut net = BayesNet::new();
    let p = net.beta(1, 2.0, 2.0).unwrap();
    let ten = net.constant_scalar(10.0);
    let n = net.mul(ten, 10.0).unwrap();
    let k = net.binomial(1, p, n).unwrap();
    net.observe(k, DVector::from_element(1, 20.0)).unwrap();
    net.override_d_log_prob(k, FixedTrialsBinomial).unwrap();
    let res = infer::nuts(&mut net, &[p], &SamplerConfig::default(), &mut rng);
    assert!(matches!(res, Err(ModelError::InvalidState(_))));
}

#[test]
fn metropolis_recovers_conjugate_posterior() {
    let mut rng = StdRng::seed_from_u64(2);
    let (mut net, p, _) = conjugate(false);
    let mut config = SamplerConfig::default();
    config.metropolis.proposal_scale = 0.5;
    let samples = infer::metropolis_hastings(&mut net, &[p], &config, &mut rng).unwrap()
        .drop(config.metropolis.drop_count)
        .down_sample(config.metropolis.down_sample);
    assert_eq!(samples.len(), 2_000);
    let m = samples.scalar_mean(p, |v| v[0] ).unwrap();
    assert_abs_diff_eq!(m, CONJUGATE_MEAN, epsilon = 0.03);
    assert!(samples.accept_rate() > 0.1);
}

#[test]
fn hamiltonian_recovers_conjugate_posterior() {
    let mut rng = StdRng::seed_from_u64(3);
    let (mut net, p, _) = conjugate(true);
    let config = SamplerConfig::default();
    let samples = infer::hamiltonian(&mut net, &[p], &config, &mut rng).unwrap()
        .drop(config.hamiltonian.drop_count);
    assert_eq!(samples.len(), 800);
    let m = samples.mean(p).unwrap()[0];
    assert!((m - CONJUGATE_MEAN).abs() < 0.03, "mean {}", m);
}

#[test]
fn nuts_recovers_conjugate_posterior() {
    let mut rng = StdRng::seed_from_u64(4);
    let (mut net, p, _) = conjugate(true);
    let mut config = SamplerConfig::default();
    config.nuts.adapt_count = 100;
    config.nuts.target_acceptance = 0.8;
    let samples = infer::nuts(&mut net, &[p], &config, &mut rng).unwrap()
        .drop(config.nuts.drop_count);
    let m = samples.mean(p).unwrap()[0];
    let sd = samples.variance(p).unwrap()[0].sqrt();
    assert!((m - CONJUGATE_MEAN).abs() < 0.03, "mean {}", m);
    assert!((sd - 0.04).abs() < 0.02, "sd {}", sd);
}

#[test]
fn baseball_nuts_population_mean() {
    let mut rng = StdRng::seed_from_u64(5);
    let path = format!("{}/data/efron-morris-75-data.tsv", env!("CARGO_MANIFEST_DIR"));
    let table = BattingTable::from_path(&path).unwrap();
    let mut model = Baseball::build(&table.hits(), &table.at_bats()).unwrap();
    let latents = model.latents();
    let mut config = SamplerConfig::default();
    config.seed = Some(5);
    config.nuts.sample_count = 400;
    config.nuts.adapt_count = 100;
    config.nuts.target_acceptance = 0.8;
    config.nuts.drop_count = 100;
    model.shuffle(&mut rng).unwrap();
    let samples = infer::nuts(&mut model.net, &latents, &config, &mut rng).unwrap()
        .drop(config.nuts.drop_count);
    let phi = samples.scalar_mean(model.phi, |v| v[0] ).unwrap();
    // The raw batting average over the 18 players is about 0.265.
    assert!(phi > 0.18 && phi < 0.35, "phi {}", phi);
    let kappa = samples.scalar_mean(model.k_base, |v| Baseball::kappa_of(v[0]) ).unwrap();
    assert!(kappa.is_finite() && kappa > 1.5);
}

#[test]
fn bundled_table() {
    let path = format!("{}/data/efron-morris-75-data.tsv", env!("CARGO_MANIFEST_DIR"));
    let table = BattingTable::from_path(&path).unwrap();
    assert_eq!(table.len(), 18);
    assert_eq!(table.hits().iter().sum::<u32>(), 215);
    assert!(table.at_bats().iter().all(|a| *a == 45 ));
    assert_eq!(table.players()[0].last_name, "Clemente");
}
