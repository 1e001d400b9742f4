pub(crate) mod alt_backend;
pub(crate) mod headers;
pub(crate) mod news_creator;
pub(crate) mod subworker;
pub(crate) mod tag_generator;
pub(crate) mod token_counter;

pub(crate) use alt_backend::{AltBackendClient, AltBackendConfig};
pub(crate) use news_creator::NewsCreatorClient;
pub(crate) use subworker::SubworkerClient;
pub(crate) use tag_generator::{TagGeneratorClient, TagGeneratorConfig};
pub(crate) use token_counter::TokenCounter;
