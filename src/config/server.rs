use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// Where cached responses are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    #[default]
    Redis,
    /// In-process map, lost on restart.
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "outcache")]
#[command(about = "HTTP API with a redis-backed response cache", long_about = None)]
#[command(version)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Cache store backend
    #[arg(long, env = "CACHE_BACKEND", value_enum, default_value_t = Backend::Redis)]
    pub backend: Backend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_and_bind() {
        let args =
            ServerArgs::try_parse_from(["outcache", "--backend", "memory", "--bind", "127.0.0.1:8080"])
                .unwrap();
        assert_eq!(args.backend, Backend::Memory);
        assert_eq!(args.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(ServerArgs::try_parse_from(["outcache", "--backend", "memcached"]).is_err());
    }
}
