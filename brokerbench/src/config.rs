use std::num::NonZeroUsize;

use rama::error::BoxError;

/// Number of concurrent send lanes sharing one broker connection.
///
/// Sizes every client group and scales the raw throughput figure
/// of the metrics snapshot.
pub const LANES_PER_GROUP: usize = 5;

/// Load generation configuration.
///
/// Set once at startup and shared read-only by every client group.
#[derive(Debug, Clone, clap::Args)]
pub struct LoadConfig {
    /// Comma delimited list of broker addresses
    #[arg(
        long,
        value_name = "ADDRESSES",
        value_parser = parse_broker_addresses,
        default_value = "localhost:9092"
    )]
    pub brokers: BrokerAddresses,

    /// Topic to publish to
    #[arg(long, default_value = "brokerbench")]
    pub topic: String,

    /// Message size in bytes
    #[arg(long, value_name = "BYTES", default_value = "300")]
    pub size: NonZeroUsize,

    /// Number of client groups (each owns one connection)
    #[arg(long, value_name = "N", default_value = "1")]
    pub workers: NonZeroUsize,

    /// Test message generation performance, do not transmit messages
    #[arg(long, default_value_t = false)]
    pub noop: bool,

    /// Broker client used to transmit messages
    #[arg(long, value_enum, default_value_t = Driver::default())]
    pub driver: Driver,
}

impl LoadConfig {
    /// Total amount of send lanes this configuration spawns.
    pub fn lane_count(&self) -> usize {
        self.workers.get() * LANES_PER_GROUP
    }
}

/// Broker client implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Driver {
    /// Newline delimited messages over a raw TCP stream.
    #[default]
    Tcp,

    /// Apache Kafka producer (requires the `kafka` feature).
    Kafka,
}

impl Driver {
    /// Fail for a driver which is not compiled into this build.
    pub fn ensure_available(self) -> Result<(), BoxError> {
        match self {
            Self::Tcp => Ok(()),
            Self::Kafka if cfg!(feature = "kafka") => Ok(()),
            Self::Kafka => Err(BoxError::from(
                "kafka driver unavailable: rebuild brokerbench with the kafka feature",
            )),
        }
    }
}

/// Non-empty list of `host:port` broker addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddresses(Vec<String>);

impl BrokerAddresses {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for BrokerAddresses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

pub fn parse_broker_addresses(input: &str) -> Result<BrokerAddresses, String> {
    let addresses: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    if addresses.is_empty() {
        return Err("at least one broker address is required".to_owned());
    }
    Ok(BrokerAddresses(addresses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        load: LoadConfig,
    }

    #[test]
    fn test_parse_broker_addresses() {
        for (input, expected) in [
            ("localhost:9092", Some(vec!["localhost:9092"])),
            (
                "a:9092,b:9092, c:9093",
                Some(vec!["a:9092", "b:9092", "c:9093"]),
            ),
            ("a:9092,,b:9092,", Some(vec!["a:9092", "b:9092"])),
            ("", None),
            (" , ,", None),
        ] {
            let result = parse_broker_addresses(input);
            match (result, expected) {
                (Ok(result), Some(expected)) => {
                    assert_eq!(result.as_slice(), expected.as_slice(), "input: '{input}'")
                }
                (Err(_), None) => (),
                (result, expected) => panic!(
                    "input = '{input}', unexpected result '{result:?}', expected: '{expected:?}'"
                ),
            }
        }
    }

    #[test]
    fn defaults_match_cli_contract() {
        let cli = TestCli::try_parse_from(["brokerbench"]).unwrap();
        assert_eq!(cli.load.brokers.as_slice(), ["localhost:9092"]);
        assert_eq!(cli.load.topic, "brokerbench");
        assert_eq!(cli.load.size.get(), 300);
        assert_eq!(cli.load.workers.get(), 1);
        assert!(!cli.load.noop);
        assert_eq!(cli.load.driver, Driver::Tcp);
        assert_eq!(cli.load.lane_count(), LANES_PER_GROUP);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "brokerbench",
            "--brokers",
            "k1:9092,k2:9092",
            "--topic",
            "load",
            "--size",
            "1024",
            "--workers",
            "4",
            "--noop",
        ])
        .unwrap();
        assert_eq!(cli.load.brokers.to_string(), "k1:9092,k2:9092");
        assert_eq!(cli.load.topic, "load");
        assert_eq!(cli.load.size.get(), 1024);
        assert_eq!(cli.load.lane_count(), 4 * LANES_PER_GROUP);
        assert!(cli.load.noop);
    }

    #[test]
    fn test_driver_availability() {
        assert!(Driver::Tcp.ensure_available().is_ok());
        assert_eq!(
            Driver::Kafka.ensure_available().is_ok(),
            cfg!(feature = "kafka")
        );
    }

    #[test]
    fn zero_size_and_workers_are_rejected() {
        assert!(TestCli::try_parse_from(["brokerbench", "--size", "0"]).is_err());
        assert!(TestCli::try_parse_from(["brokerbench", "--workers", "0"]).is_err());
        assert!(TestCli::try_parse_from(["brokerbench", "--brokers", ","]).is_err());
    }
}
