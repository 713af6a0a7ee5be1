pub mod articles;
pub mod edges;
pub mod entities;
pub mod events;
pub mod ids;
pub mod processing;
pub mod store;
pub mod stories;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use articles::Article;
pub use edges::GraphEdge;
pub use entities::{ArticleEntity, Entity};
pub use events::EconomicEvent;
pub use ids::{ArticleId, EntityId, EventId, StoryId};
pub use processing::{ProcessingLog, ProcessingStatus};
pub use store::{ArticleWithEntities, EnrichedFeatures, PersistenceStore};
pub use stories::{NewStory, SimilarStory, Story, StoryArticleLink, StoryRelationship, EVOLVED_FROM};
