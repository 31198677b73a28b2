//! Clients for the out-of-process collaborators: the AI text-completion
//! service and the payment processor.

pub mod advice;
pub mod assistant;
pub mod card;
pub mod gemini;
pub mod payments;

pub use assistant::Assistant;
pub use card::{validate_card_details, CardError};
pub use gemini::{AiServiceError, CompletionRequest, CompletionResponse, GeminiClient, TextCompletion};
pub use payments::{
    CardSummary, HttpPaymentProcessor, PaymentIntent, PaymentMethod, PaymentProcessor, Payout, ProcessorError,
    SimulatedProcessor,
};
