use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("store operation failed: {source}"))]
    Store { source: watch_store::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
