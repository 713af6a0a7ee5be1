pub mod claude;
pub mod openai;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use openai::{OpenAi, StructuredOutput};
pub use traits::{EmbedAgent, Message, MessageRole};
