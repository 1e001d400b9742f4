mod builder;
mod client;
pub(crate) mod models;

pub(crate) use client::NewsCreatorClient;
pub(crate) use models::{
    ClusterInput, GenreTieBreakCandidate, GenreTieBreakRequest, GenreTieBreakResponse,
    NewsCreatorSummary, RepresentativeSentence, Summary, SummaryMetadata, SummaryOptions,
    SummaryRequest, SummaryResponse, TagSignalPayload,
};
