pub mod attachment_decoder;
pub mod envelope_normalizer;
pub mod image_compressor;
pub mod media_fetcher;
pub mod outbound_sender;
pub mod qa_client;
pub mod retry;
pub mod transport_client;
pub mod workflow_client;

pub use image_compressor::ImageCompressor;
pub use media_fetcher::MediaFetcher;
pub use outbound_sender::OutboundSender;
pub use qa_client::{QaClient, QuestionAnswering};
pub use retry::TokioSleeper;
pub use transport_client::TransportClient;
pub use workflow_client::WorkflowDispatcher;
