pub mod models;

pub use models::story::{NewStory, SimilarStory, Story};
pub use models::story_article_link::StoryArticleLink;
pub use models::story_relationship::{StoryRelationship, EVOLVED_FROM};
