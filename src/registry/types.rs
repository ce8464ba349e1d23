use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the fifteen backing-service types a DSE may declare as a
/// dependency (spec.md §3.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Postgres,
    Mysql,
    Redis,
    Mongodb,
    Rabbitmq,
    Minio,
    Elasticsearch,
    Kafka,
    Nats,
    Memcached,
    Cassandra,
    Consul,
    Vault,
    Influxdb,
    Jaeger,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 15] = [
        DependencyKind::Postgres,
        DependencyKind::Mysql,
        DependencyKind::Redis,
        DependencyKind::Mongodb,
        DependencyKind::Rabbitmq,
        DependencyKind::Minio,
        DependencyKind::Elasticsearch,
        DependencyKind::Kafka,
        DependencyKind::Nats,
        DependencyKind::Memcached,
        DependencyKind::Cassandra,
        DependencyKind::Consul,
        DependencyKind::Vault,
        DependencyKind::Influxdb,
        DependencyKind::Jaeger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Postgres => "postgres",
            DependencyKind::Mysql => "mysql",
            DependencyKind::Redis => "redis",
            DependencyKind::Mongodb => "mongodb",
            DependencyKind::Rabbitmq => "rabbitmq",
            DependencyKind::Minio => "minio",
            DependencyKind::Elasticsearch => "elasticsearch",
            DependencyKind::Kafka => "kafka",
            DependencyKind::Nats => "nats",
            DependencyKind::Memcached => "memcached",
            DependencyKind::Cassandra => "cassandra",
            DependencyKind::Consul => "consul",
            DependencyKind::Vault => "vault",
            DependencyKind::Influxdb => "influxdb",
            DependencyKind::Jaeger => "jaeger",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnsupportedDependencyType(s.to_string()))
    }
}
