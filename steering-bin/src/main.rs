/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Content steering service runnable.

mod config;

use std::process::ExitCode;
use steering::selector::DEFAULT_EPSILON;
use steering_api_rest::rest_api::service::SteeringService;
use steering_api_rest::rest_api::service::SteeringServiceConfig;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;

/// `--strategy` default, per an open question in the source material: the
/// canonical epsilon-greedy.
const DEFAULT_STRATEGY: &str = "epsilon_greedy";

/// Startup arguments parsed by hand, per §6.4: `--strategy`, `--log_suffix`,
/// `--verbose`.
struct CliArgs {
    strategy: String,
    log_suffix: String,
    verbose: bool,
}

impl CliArgs {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut strategy = DEFAULT_STRATEGY.to_string();
        let mut log_suffix = String::new();
        let mut verbose = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--strategy" => {
                    if let Some(value) = args.next() {
                        strategy = value;
                    } else {
                        log::warn!("--strategy given without a value; keeping '{strategy}'");
                    }
                }
                "--log_suffix" => {
                    if let Some(value) = args.next() {
                        log_suffix = value;
                    } else {
                        log::warn!("--log_suffix given without a value; keeping an empty suffix");
                    }
                }
                "--verbose" => verbose = true,
                other => log::warn!("Ignoring unrecognized argument '{other}'"),
            }
        }
        Self {
            strategy,
            log_suffix,
            verbose,
        }
    }
}

/// Application main entrypoint.
fn main() -> ExitCode {
    let cli_args = CliArgs::parse(std::env::args().skip(1));
    if let Err(e) = init_logger(cli_args.verbose) {
        println!("Failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }
    // Defaults to using one thread per core when no limit is set.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run_async(cli_args))
}

/// Initialize the logging system and apply filters. `--verbose` raises the
/// default level from `Info` to `Debug`.
fn init_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let default_level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::builder()
        .filter_level(default_level)
        .filter(Some("actix_server"), log::LevelFilter::Warn)
        .filter(Some("h2"), log::LevelFilter::Info)
        .filter(Some("tower"), log::LevelFilter::Info)
        .filter(Some("hyper_util"), log::LevelFilter::Info)
        .write_style(env_logger::fmt::WriteStyle::Auto)
        .target(env_logger::fmt::Target::Stdout)
        .is_test(false)
        .parse_env(
            env_logger::Env::new()
                .filter("LOG_LEVEL")
                .write_style("LOG_STYLE"),
        )
        .try_init()
}

/// Async code entry point.
pub async fn run_async(cli_args: CliArgs) -> ExitCode {
    let service_config = SteeringServiceConfig {
        strategy_name: cli_args.strategy,
        epsilon: DEFAULT_EPSILON,
        network_name: config::network_name(),
        monitor_interval_seconds: config::monitor_interval_seconds(),
        oracle_interval_seconds: config::oracle_interval_seconds(),
        log_dir: config::log_dir(),
        log_suffix: cli_args.log_suffix,
    };
    let service = match SteeringService::new(service_config) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to construct the steering service: {e}");
            return ExitCode::FAILURE;
        }
    };
    service.start().await;
    let app_future = steering_api_rest::rest_api::run_http_server(
        &service,
        &config::http_bind_address(),
        config::http_bind_port(),
    );
    let signals_future = block_until_signaled();
    let res = tokio::select! {
        res = app_future => {
            log::trace!("app_future finished");
            res
        },
        _ = signals_future => {
            log::trace!("signals_future finished");
            Ok(())
        },
    }
    .map_err(|e| log::error!("{e}"));
    service.stop().await;
    if res.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Block until SIGTERM or SIGINT is recieved.
async fn block_until_signaled() {
    let mut sigint = signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigterm.recv() => {
            log::trace!("SIGTERM recieved.")
        },
        _ = sigint.recv() => {
            log::trace!("SIGINT recieved.")
        },
    };
}

mod test {
    use super::*;

    #[test]
    fn test_cli_args_parses_flags() {
        let args = CliArgs::parse(
            vec!["--strategy", "ucb1", "--log_suffix", "_exp1", "--verbose"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(args.strategy, "ucb1");
        assert_eq!(args.log_suffix, "_exp1");
        assert!(args.verbose);
    }

    #[test]
    fn test_cli_args_defaults_when_unset() {
        let args = CliArgs::parse(std::iter::empty());
        assert_eq!(args.strategy, DEFAULT_STRATEGY);
        assert_eq!(args.log_suffix, "");
        assert!(!args.verbose);
    }
}
