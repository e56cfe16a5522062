//! Almacén en memoria para las pruebas del núcleo.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Comment, CommentDraft, Emotion, Sentiment, Tag, TagEdit};
use crate::store::{CommentStore, TagStore};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub tags: Vec<Tag>,
    pub comments: Vec<Comment>,
}

impl InMemoryStore {
    pub fn new(tags: Vec<Tag>, comments: Vec<Comment>) -> Self {
        Self { tags, comments }
    }
}

#[async_trait]
impl TagStore for InMemoryStore {
    async fn get_tags_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        Ok(self
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn get_tags_by_user(&self, user_id: i64) -> Result<Vec<Tag>> {
        Ok(self
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_tag_edit(&self, _user_id: i64, _edit: &TagEdit) -> Result<Tag> {
        unimplemented!("las pruebas del núcleo no escriben tags")
    }

    async fn delete_tags(&self, _user_id: i64, _ids: &[i64]) -> Result<()> {
        unimplemented!("las pruebas del núcleo no borran tags")
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn get_comments_by_ids(&self, ids: &[i64]) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn get_comments_by_user(&self, user_id: i64) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_comments_by_tag_closure(&self, tag_ids: &[i64]) -> Result<Vec<Comment>> {
        // Una fila por pareja (comentario, tag), como haría la consulta real;
        // la deduplicación es responsabilidad de `retrieval`.
        let mut rows = Vec::new();
        for comment in &self.comments {
            for tag_id in &comment.tag_ids {
                if tag_ids.contains(tag_id) {
                    rows.push(comment.clone());
                }
            }
        }
        Ok(rows)
    }

    async fn save_comment(&self, _user_id: i64, _draft: &CommentDraft) -> Result<Comment> {
        unimplemented!("las pruebas del núcleo no escriben comentarios")
    }

    async fn delete_comments(&self, _user_id: i64, _ids: &[i64]) -> Result<()> {
        unimplemented!("las pruebas del núcleo no borran comentarios")
    }
}

pub fn tag(id: i64, name: &str, parent_id: Option<i64>, user_id: i64) -> Tag {
    Tag {
        id,
        name: name.to_string(),
        color: "#3366ff".to_string(),
        parent_id,
        user_id,
        path: None,
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn comment(id: i64, user_id: i64, text: &str, tag_ids: Vec<i64>) -> Comment {
    Comment {
        id,
        text: text.to_string(),
        user_id,
        created_str: at(1_700_000_000 + id),
        modified_str: at(1_700_000_000 + id),
        analyzed: false,
        sentiment: None,
        emotion: None,
        tag_ids,
    }
}

pub fn analyzed(mut c: Comment, sentiment: Sentiment, emotion: Emotion) -> Comment {
    c.analyzed = true;
    c.sentiment = Some(sentiment);
    c.emotion = Some(emotion);
    c
}
