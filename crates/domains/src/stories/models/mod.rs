pub mod story;
pub mod story_article_link;
pub mod story_relationship;
