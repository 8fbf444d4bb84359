use clap::{Parser, Subcommand};
use std::error::Error;
use std::str::FromStr;
use tt_control::{PidConfig, PidController, PidGains};
use tt_sim::{PlantConfig, ThermalPlant};
use tt_tune::{
    RelayAutotuner, RelayEstimate, RelayOutcome, TunerConfig, TuningRule, run_relay_test,
};

#[derive(Parser)]
#[command(name = "tt-cli")]
#[command(about = "Thermotune CLI - relay-feedback PID autotuning utility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tuning rules and their coefficients
    Rules,
    /// Run a relay test against the simulated thermal plant
    Tune {
        /// Target temperature of the autotune routine, degrees Celsius
        #[arg(short, long, default_value_t = 30.0)]
        target: f64,
        /// Value by which output will be stepped up/down from zero, amps
        #[arg(short, long, default_value_t = 1.0)]
        step: f64,
        /// Reference period for local minima/maxima, seconds
        #[arg(short = 'b', long, default_value_t = 3.0)]
        lookback: f64,
        /// How far the measurement must overshoot/undershoot the setpoint,
        /// degrees Celsius
        #[arg(short, long, default_value_t = 1.5)]
        noiseband: f64,
        /// Tuning rule used for the headline gain report
        #[arg(short, long, default_value = "ziegler-nichols", value_parser = parse_rule)]
        rule: TuningRule,
        /// Abort the relay test after this many samples
        #[arg(long, default_value_t = 20_000)]
        max_samples: usize,
        /// Emit the estimate and per-rule gains as JSON
        #[arg(long)]
        json: bool,
        /// After tuning, run a closed-loop simulation with the derived gains
        #[arg(long)]
        verify: bool,
        /// Plant ambient temperature, degrees Celsius
        #[arg(long, default_value_t = 20.0)]
        ambient: f64,
        /// Plant steady-state response, degrees Celsius per amp
        #[arg(long, default_value_t = 15.0)]
        plant_gain: f64,
        /// Plant first-order time constant, seconds
        #[arg(long, default_value_t = 10.0)]
        time_constant: f64,
        /// Plant measurement transport delay, seconds
        #[arg(long, default_value_t = 2.0)]
        delay: f64,
        /// Plant sampling interval, seconds
        #[arg(long, default_value_t = 0.5)]
        interval: f64,
    },
}

fn parse_rule(s: &str) -> Result<TuningRule, String> {
    TuningRule::from_str(s).map_err(|e| e.to_string())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rules => cmd_rules(),
        Commands::Tune {
            target,
            step,
            lookback,
            noiseband,
            rule,
            max_samples,
            json,
            verify,
            ambient,
            plant_gain,
            time_constant,
            delay,
            interval,
        } => {
            let tuner_config = TunerConfig {
                setpoint: target,
                output_step: step,
                noise_band: noiseband,
                sample_interval_s: interval,
                lookback_s: lookback,
            };
            let plant_config = PlantConfig {
                ambient_c: ambient,
                drive_gain_c_per_a: plant_gain,
                time_constant_s: time_constant,
                delay_s: delay,
                sample_interval_s: interval,
                initial_c: ambient,
            };
            cmd_tune(tuner_config, plant_config, rule, max_samples, json, verify)
        }
    }
}

fn cmd_rules() -> Result<(), Box<dyn Error>> {
    println!("Available tuning rules:");
    for rule in TuningRule::ALL {
        let c = rule.coefficients();
        println!(
            "  {:<16} c_p={:<7} c_i={:<7} c_d={}",
            rule.name(),
            c.c_p,
            c.c_i,
            c.c_d
        );
    }
    Ok(())
}

fn cmd_tune(
    tuner_config: TunerConfig,
    plant_config: PlantConfig,
    rule: TuningRule,
    max_samples: usize,
    json: bool,
    verify: bool,
) -> Result<(), Box<dyn Error>> {
    let mut tuner = RelayAutotuner::new(tuner_config)?;
    let mut plant = ThermalPlant::new(plant_config)?;

    println!(
        "Running relay test: setpoint {:.2} degC, step {:.2} A, band {:.2} degC",
        tuner_config.setpoint, tuner_config.output_step, tuner_config.noise_band
    );

    let outcome = run_relay_test(&mut tuner, &mut plant, max_samples)?;
    let estimate = match outcome {
        RelayOutcome::Converged { estimate } => estimate,
        RelayOutcome::Failed => {
            eprintln!(
                "✗ Relay test failed: no amplitude convergence within {} peaks",
                tuner.peak_count()
            );
            std::process::exit(1);
        }
    };

    if json {
        print_json_report(&estimate)?;
    } else {
        print_report(&estimate, rule);
    }

    if verify {
        run_verification(&tuner_config, &plant_config, estimate, rule)?;
    }
    Ok(())
}

fn print_report(estimate: &RelayEstimate, headline: TuningRule) {
    println!("✓ Relay test converged");
    println!("  Ku: {:.6}", estimate.ultimate_gain);
    println!("  Pu: {:.3} s", estimate.ultimate_period_s);
    println!("\nGains by rule:");
    for rule in TuningRule::ALL {
        let gains = rule.gains(estimate.ultimate_gain, estimate.ultimate_period_s);
        let marker = if rule == headline { "*" } else { " " };
        println!(
            "{} {:<16} Kp={:<12.6} Ki={:<12.6} Kd={:.6}",
            marker,
            rule.name(),
            gains.kp,
            gains.ki,
            gains.kd
        );
    }
}

fn print_json_report(estimate: &RelayEstimate) -> Result<(), Box<dyn Error>> {
    let rules: serde_json::Map<String, serde_json::Value> = TuningRule::ALL
        .into_iter()
        .map(|rule| {
            let gains = rule.gains(estimate.ultimate_gain, estimate.ultimate_period_s);
            (
                rule.name().to_string(),
                serde_json::json!({ "kp": gains.kp, "ki": gains.ki, "kd": gains.kd }),
            )
        })
        .collect();
    let report = serde_json::json!({
        "ultimate_gain": estimate.ultimate_gain,
        "ultimate_period_s": estimate.ultimate_period_s,
        "rules": rules,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Close the loop on a fresh plant with the derived gains and report how
/// the controlled temperature lands.
fn run_verification(
    tuner_config: &TunerConfig,
    plant_config: &PlantConfig,
    estimate: RelayEstimate,
    rule: TuningRule,
) -> Result<(), Box<dyn Error>> {
    let gains = rule.gains(estimate.ultimate_gain, estimate.ultimate_period_s);

    // Rule gains are per-second; the velocity-form controller applies
    // them per sample, so fold in the sampling interval.
    let dt = plant_config.sample_interval_s;
    let discrete = PidGains {
        kp: gains.kp,
        ki: gains.ki * dt,
        kd: gains.kd / dt,
    };
    let limit = 2.0 * tuner_config.output_step;
    let mut pid = PidController::new(PidConfig::new(discrete, -limit, limit)?);
    pid.set_target(tuner_config.setpoint);

    let mut plant = ThermalPlant::new(*plant_config)?;
    let duration_s = 1200.0;
    let samples = (duration_s / dt).ceil() as usize;

    let mut drive = 0.0;
    let mut measured = plant_config.initial_c;
    let mut worst_tail_error: f64 = 0.0;
    let tail_start = samples.saturating_sub(100);
    for k in 0..samples {
        measured = plant.step(drive);
        drive = pid.update(measured);
        if k >= tail_start {
            worst_tail_error = worst_tail_error.max((measured - tuner_config.setpoint).abs());
        }
    }

    println!("\nClosed-loop verification ({} rule, {:.0} s):", rule, duration_s);
    println!("  Final temperature: {:.3} degC", measured);
    println!("  Max error over last 100 samples: {:.3} degC", worst_tail_error);
    Ok(())
}
