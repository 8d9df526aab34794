fn log_if(x : f64, log_form : bool) -> f64 {
    if log_form {
        x.ln()
    } else {
        x
    }
}

fn log_zero_if(log_form : bool) -> f64 {
    if log_form {
        f64::NEG_INFINITY
    } else {
        0.0
    }
}

fn exp_if(x : f64, exp_form : bool) -> f64 {
    if exp_form {
        x.exp()
    } else {
        x
    }
}

fn any_nan(a : f64, b : f64) -> bool {
    a.is_nan() || b.is_nan()
}

/// Scalar densities and probability mass functions. Every function takes a
/// log_form flag: when set, the log-density is returned (which is what samplers
/// consume); otherwise the density itself. Invalid parameters yield NaN;
/// values outside the support yield zero density (negative infinity in log form).
pub mod dens {

    use special::Gamma;

    // (2*pi).ln()
    const LN_2_PI : f64 = 1.8378770664093454835606594728112352797227949472755668256343030809;

    // (pi).ln()
    const LN_PI : f64 = 1.1447298858494001741434273513530587116472948129153115715136230714;

    pub fn ln_beta(a : f64, b : f64) -> f64 {
        a.ln_gamma().0 + b.ln_gamma().0 - (a + b).ln_gamma().0
    }

    pub fn dunif(x : f64, lower : f64, upper : f64, log_form : bool) -> f64 {
        if super::any_nan(lower, upper) || !(upper > lower) || x.is_nan() {
            return f64::NAN;
        }
        if x < lower || x > upper {
            super::log_zero_if(log_form)
        } else {
            super::exp_if(-(upper - lower).ln(), !log_form)
        }
    }

    fn dexp_log_compute(x : f64, rate : f64) -> f64 {
        rate.ln() - rate * x
    }

    pub fn dexp(x : f64, rate : f64, log_form : bool) -> f64 {
        if x.is_nan() || rate.is_nan() || rate <= 0.0 || rate.is_infinite() {
            return f64::NAN;
        }
        if x < 0.0 {
            super::log_zero_if(log_form)
        } else if x.is_infinite() {
            super::log_zero_if(log_form)
        } else {
            super::exp_if(dexp_log_compute(x, rate), !log_form)
        }
    }

    fn beta_sanity_check(x : f64, a : f64, b : f64) -> bool {
        !x.is_nan() && !super::any_nan(a, b) && a > 0.0 && b > 0.0
    }

    fn dbeta_log_compute(x : f64, a : f64, b : f64) -> f64 {
        -ln_beta(a, b) + (a - 1.0)*x.ln() + (b - 1.0)*(1.0 - x).ln()
    }

    pub fn dbeta(x : f64, a : f64, b : f64, log_form : bool) -> f64 {
        if !beta_sanity_check(x, a, b) {
            return f64::NAN;
        }
        if x < 0.0 || x > 1.0 {
            return super::log_zero_if(log_form);
        }
        if x == 0.0 {
            if a < 1.0 {
                f64::INFINITY
            } else if a > 1.0 {
                super::log_zero_if(log_form)
            } else {
                super::log_if(b, log_form)
            }
        } else if x == 1.0 {
            if b < 1.0 {
                f64::INFINITY
            } else if b > 1.0 {
                super::log_zero_if(log_form)
            } else {
                super::log_if(a, log_form)
            }
        } else {
            super::exp_if(dbeta_log_compute(x, a, b), !log_form)
        }
    }

    fn norm_sanity_check(x : f64, mu : f64, stddev : f64) -> bool {
        !x.is_nan() && !super::any_nan(mu, stddev) && stddev > 0.0
    }

    // based on stats::dnorm.ipp
    fn dnorm_log_compute(x : f64, mu : f64, stddev : f64) -> f64 {
        let z = (x - mu) / stddev;
        -0.5 * LN_2_PI - stddev.ln() - z.powi(2) / 2.0
    }

    pub fn dnorm(x : f64, mu : f64, stddev : f64, log_form : bool) -> f64 {
        if !norm_sanity_check(x, mu, stddev) {
            f64::NAN
        } else if x.is_infinite() || mu.is_infinite() || stddev.is_infinite() {
            super::log_zero_if(log_form)
        } else {
            super::exp_if(dnorm_log_compute(x, mu, stddev), !log_form)
        }
    }

    // Half-Cauchy centered at zero: 2 / (pi * scale * (1 + (x/scale)^2)) over x >= 0.
    fn dhalfcauchy_log_compute(x : f64, scale : f64) -> f64 {
        let z = x / scale;
        std::f64::consts::LN_2 - LN_PI - scale.ln() - (1.0 + z*z).ln()
    }

    pub fn dhalfcauchy(x : f64, scale : f64, log_form : bool) -> f64 {
        if x.is_nan() || scale.is_nan() || scale <= 0.0 {
            return f64::NAN;
        }
        if x < 0.0 || x.is_infinite() {
            super::log_zero_if(log_form)
        } else {
            super::exp_if(dhalfcauchy_log_compute(x, scale), !log_form)
        }
    }

    fn binom_sanity_check(prob : f64) -> bool {
        !prob.is_nan() && prob >= 0.0 && prob <= 1.0
    }

    fn log_binomial_coef(n : u64, k : u64) -> f64 {
        ((n+1) as f64).ln_gamma().0 - ( ((k+1) as f64).ln_gamma().0 + ((n-k+1) as f64).ln_gamma().0 )
    }

    // Reference: stats::dbinom.ipp
    fn dbinom_log_compute(x : u64, ntrials : u64, prob : f64) -> f64 {
        if ntrials == 0 {
            0.0
        } else if x == 0 {
            ntrials as f64 * (1. - prob).ln()
        } else if x == ntrials {
            x as f64 * prob.ln()
        } else {
            log_binomial_coef(ntrials, x) +
                x as f64 * prob.ln() +
                (ntrials - x) as f64 * (1. - prob).ln()
        }
    }

    pub fn dbinom(x : u64, ntrials : u64, prob : f64, log_form : bool) -> f64 {
        if !binom_sanity_check(prob) {
            f64::NAN
        } else if x > ntrials {
            super::log_zero_if(log_form)
        } else {
            super::exp_if(dbinom_log_compute(x, ntrials, prob), !log_form)
        }
    }

}
