//! Adaptador de almacenamiento sobre Neo4j.
//!
//! Grafo: nodos (:Tag) y (:Comment), relaciones
//! (:Comment)-[:TAGGED]->(:Tag) para la pertenencia muchos-a-muchos y
//! (:Tag)-[:CHILD_OF]->(:Tag) hacia el padre. La clausura jerárquica NO se
//! resuelve aquí: eso es trabajo del módulo `hierarchy` sobre la instantánea
//! del bosque del usuario.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Row};
use tracing::info;
use url::Url;

use crate::config::AppConfig;
use crate::models::{Comment, CommentDraft, Emotion, Sentiment, Tag, TagEdit};
use crate::store::{CommentStore, TagStore};

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea constraints básicos para las etiquetas usadas en el grafo:
/// :Tag, :Comment y el contador :Sequence.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        // Tag.id único
        "CREATE CONSTRAINT tag_id IF NOT EXISTS
         FOR (t:Tag)
         REQUIRE t.id IS UNIQUE",
        // Comment.id único
        "CREATE CONSTRAINT comment_id IF NOT EXISTS
         FOR (c:Comment)
         REQUIRE c.id IS UNIQUE",
        // Sequence.name único
        "CREATE CONSTRAINT sequence_name IF NOT EXISTS
         FOR (s:Sequence)
         REQUIRE s.name IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints básicos creados).");
    Ok(())
}

const TAG_RETURN: &str =
    "RETURN t.id AS id, t.name AS name, t.color AS color, t.user_id AS user_id,
            p.id AS parent_id";

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Siguiente valor del contador de ids enteros con ese nombre.
    async fn next_id(&self, sequence: &str) -> Result<i64> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MERGE (s:Sequence {name: $name})
                     ON CREATE SET s.value = 0
                     SET s.value = s.value + 1
                     RETURN s.value AS value",
                )
                .param("name", sequence.to_string()),
            )
            .await?;
        let row = cursor
            .next()
            .await?
            .ok_or_else(|| anyhow!("La secuencia {sequence} no devolvió ningún valor"))?;
        row.get::<i64>("value")
            .ok_or_else(|| anyhow!("Valor de secuencia ilegible para {sequence}"))
    }

    async fn collect_tags(&self, q: neo4rs::Query) -> Result<Vec<Tag>> {
        let mut cursor = self.graph.execute(q).await?;
        let mut tags = Vec::new();
        while let Some(row) = cursor.next().await? {
            tags.push(tag_from_row(&row)?);
        }
        Ok(tags)
    }

    /// Ejecuta una consulta con una fila por pareja (comentario, tag) y las
    /// agrupa en comentarios con su conjunto `tag_ids` ascendente.
    async fn collect_comments(&self, q: neo4rs::Query) -> Result<Vec<Comment>> {
        let mut cursor = self.graph.execute(q).await?;
        let mut grouped: BTreeMap<i64, Comment> = BTreeMap::new();
        while let Some(row) = cursor.next().await? {
            let id = row
                .get::<i64>("id")
                .ok_or_else(|| anyhow!("Fila de comentario sin id"))?;
            let entry = match grouped.entry(id) {
                std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(comment_from_row(&row)?)
                }
            };
            if let Some(tag_id) = row.get::<i64>("tag_id") {
                entry.tag_ids.push(tag_id);
            }
        }

        let mut comments: Vec<Comment> = grouped.into_values().collect();
        for comment in &mut comments {
            comment.tag_ids.sort_unstable();
            comment.tag_ids.dedup();
        }
        Ok(comments)
    }
}

fn tag_from_row(row: &Row) -> Result<Tag> {
    Ok(Tag {
        id: row
            .get::<i64>("id")
            .ok_or_else(|| anyhow!("Fila de tag sin id"))?,
        name: row
            .get::<String>("name")
            .ok_or_else(|| anyhow!("Fila de tag sin nombre"))?,
        color: row.get::<String>("color").unwrap_or_default(),
        parent_id: row.get::<i64>("parent_id"),
        user_id: row
            .get::<i64>("user_id")
            .ok_or_else(|| anyhow!("Fila de tag sin user_id"))?,
        path: None,
    })
}

fn comment_from_row(row: &Row) -> Result<Comment> {
    let sentiment = match row.get::<String>("sentiment") {
        Some(s) => Some(Sentiment::from_str(&s)?),
        None => None,
    };
    let emotion = match row.get::<String>("emotion") {
        Some(e) => Some(Emotion::from_str(&e)?),
        None => None,
    };
    Ok(Comment {
        id: row
            .get::<i64>("id")
            .ok_or_else(|| anyhow!("Fila de comentario sin id"))?,
        text: row.get::<String>("text").unwrap_or_default(),
        user_id: row
            .get::<i64>("user_id")
            .ok_or_else(|| anyhow!("Fila de comentario sin user_id"))?,
        created_str: parse_timestamp(row, "created_str")?,
        modified_str: parse_timestamp(row, "modified_str")?,
        analyzed: row.get::<bool>("analyzed").unwrap_or(false),
        sentiment,
        emotion,
        tag_ids: Vec::new(),
    })
}

fn parse_timestamp(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    let raw = row
        .get::<String>(column)
        .ok_or_else(|| anyhow!("Fila de comentario sin {column}"))?;
    Ok(DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| anyhow!("Timestamp ilegible en {column}: {e}"))?
        .with_timezone(&Utc))
}

const COMMENT_RETURN: &str =
    "RETURN c.id AS id, c.text AS text, c.user_id AS user_id,
            c.created_str AS created_str, c.modified_str AS modified_str,
            c.analyzed AS analyzed, c.sentiment AS sentiment, c.emotion AS emotion,
            t.id AS tag_id";

#[async_trait]
impl TagStore for Neo4jStore {
    async fn get_tags_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        self.collect_tags(
            query(&format!(
                "MATCH (t:Tag) WHERE t.id IN $ids
                 OPTIONAL MATCH (t)-[:CHILD_OF]->(p:Tag)
                 {TAG_RETURN}"
            ))
            .param("ids", ids.to_vec()),
        )
        .await
    }

    async fn get_tags_by_user(&self, user_id: i64) -> Result<Vec<Tag>> {
        self.collect_tags(
            query(&format!(
                "MATCH (t:Tag) WHERE t.user_id = $user_id
                 OPTIONAL MATCH (t)-[:CHILD_OF]->(p:Tag)
                 {TAG_RETURN} ORDER BY id"
            ))
            .param("user_id", user_id),
        )
        .await
    }

    async fn apply_tag_edit(&self, user_id: i64, edit: &TagEdit) -> Result<Tag> {
        let tag_id = match edit.id {
            Some(id) => id,
            None => self.next_id("tags").await?,
        };
        let child_ids: Vec<i64> = {
            // Los ids de los hijos nuevos se reservan antes de abrir la
            // transacción; un hueco en la secuencia por un rollback es inocuo.
            let mut ids = Vec::with_capacity(edit.children_to_create.len());
            for _ in &edit.children_to_create {
                ids.push(self.next_id("tags").await?);
            }
            ids
        };

        // La edición compuesta (tag + bajas + altas de hijos) es todo o nada.
        let txn = self.graph.start_txn().await?;

        txn.run(
            query(
                "MERGE (t:Tag {id: $id})
                 SET t.name = $name, t.color = $color, t.user_id = $user_id",
            )
            .param("id", tag_id)
            .param("name", edit.name.clone())
            .param("color", edit.color.clone())
            .param("user_id", user_id),
        )
        .await?;

        txn.run(
            query("MATCH (t:Tag {id: $id})-[r:CHILD_OF]->(:Tag) DELETE r").param("id", tag_id),
        )
        .await?;
        if let Some(parent_id) = edit.parent_id {
            txn.run(
                query(
                    "MATCH (t:Tag {id: $id}), (p:Tag {id: $parent_id, user_id: $user_id})
                     CREATE (t)-[:CHILD_OF]->(p)",
                )
                .param("id", tag_id)
                .param("parent_id", parent_id)
                .param("user_id", user_id),
            )
            .await?;
        }

        if !edit.children_to_delete.is_empty() {
            txn.run(
                query(
                    "MATCH (t:Tag) WHERE t.id IN $ids AND t.user_id = $user_id
                     DETACH DELETE t",
                )
                .param("ids", edit.children_to_delete.clone())
                .param("user_id", user_id),
            )
            .await?;
        }

        for (child, child_id) in edit.children_to_create.iter().zip(&child_ids) {
            txn.run(
                query(
                    "MATCH (p:Tag {id: $parent_id})
                     CREATE (c:Tag {id: $id, name: $name, color: $color, user_id: $user_id})
                     CREATE (c)-[:CHILD_OF]->(p)",
                )
                .param("parent_id", tag_id)
                .param("id", *child_id)
                .param("name", child.name.clone())
                .param("color", child.color.clone())
                .param("user_id", user_id),
            )
            .await?;
        }

        txn.commit().await?;

        let saved = self.get_tags_by_ids(&[tag_id]).await?;
        saved
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("El tag {tag_id} no existe tras guardarlo"))
    }

    async fn delete_tags(&self, user_id: i64, ids: &[i64]) -> Result<()> {
        self.graph
            .run(
                query(
                    "MATCH (t:Tag) WHERE t.id IN $ids AND t.user_id = $user_id
                     DETACH DELETE t",
                )
                .param("ids", ids.to_vec())
                .param("user_id", user_id),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommentStore for Neo4jStore {
    async fn get_comments_by_ids(&self, ids: &[i64]) -> Result<Vec<Comment>> {
        self.collect_comments(
            query(&format!(
                "MATCH (c:Comment) WHERE c.id IN $ids
                 OPTIONAL MATCH (c)-[:TAGGED]->(t:Tag)
                 {COMMENT_RETURN}"
            ))
            .param("ids", ids.to_vec()),
        )
        .await
    }

    async fn get_comments_by_user(&self, user_id: i64) -> Result<Vec<Comment>> {
        self.collect_comments(
            query(&format!(
                "MATCH (c:Comment) WHERE c.user_id = $user_id
                 OPTIONAL MATCH (c)-[:TAGGED]->(t:Tag)
                 {COMMENT_RETURN}"
            ))
            .param("user_id", user_id),
        )
        .await
    }

    async fn get_comments_by_tag_closure(&self, tag_ids: &[i64]) -> Result<Vec<Comment>> {
        // Pertenencia a cualquier tag de la clausura; se devuelven todos los
        // tags de cada comentario, no solo los que dispararon la selección.
        self.collect_comments(
            query(&format!(
                "MATCH (c:Comment)-[:TAGGED]->(m:Tag) WHERE m.id IN $ids
                 WITH DISTINCT c
                 OPTIONAL MATCH (c)-[:TAGGED]->(t:Tag)
                 {COMMENT_RETURN}"
            ))
            .param("ids", tag_ids.to_vec()),
        )
        .await
    }

    async fn save_comment(&self, user_id: i64, draft: &CommentDraft) -> Result<Comment> {
        let comment_id = match draft.id {
            Some(id) => id,
            None => self.next_id("comments").await?,
        };
        let now = Utc::now().to_rfc3339();

        let txn = self.graph.start_txn().await?;

        txn.run(
            query(
                "MERGE (c:Comment {id: $id})
                 ON CREATE SET c.created_str = $now, c.user_id = $user_id
                 SET c.text = $text, c.modified_str = $now, c.analyzed = $analyzed",
            )
            .param("id", comment_id)
            .param("user_id", user_id)
            .param("text", draft.text.clone())
            .param("now", now)
            .param("analyzed", draft.analyzed),
        )
        .await?;

        // Propiedades opcionales: presentes solo cuando hay análisis.
        match draft.sentiment {
            Some(sentiment) => {
                txn.run(
                    query("MATCH (c:Comment {id: $id}) SET c.sentiment = $sentiment")
                        .param("id", comment_id)
                        .param("sentiment", sentiment.as_str().to_string()),
                )
                .await?
            }
            None => {
                txn.run(
                    query("MATCH (c:Comment {id: $id}) REMOVE c.sentiment").param("id", comment_id),
                )
                .await?
            }
        }
        match draft.emotion {
            Some(emotion) => {
                txn.run(
                    query("MATCH (c:Comment {id: $id}) SET c.emotion = $emotion")
                        .param("id", comment_id)
                        .param("emotion", emotion.as_str().to_string()),
                )
                .await?
            }
            None => {
                txn.run(
                    query("MATCH (c:Comment {id: $id}) REMOVE c.emotion").param("id", comment_id),
                )
                .await?
            }
        }

        // Reemplazo completo del conjunto de pertenencias.
        txn.run(
            query("MATCH (c:Comment {id: $id})-[r:TAGGED]->(:Tag) DELETE r")
                .param("id", comment_id),
        )
        .await?;
        if !draft.tag_ids.is_empty() {
            txn.run(
                query(
                    "MATCH (c:Comment {id: $id})
                     MATCH (t:Tag) WHERE t.id IN $tag_ids AND t.user_id = $user_id
                     CREATE (c)-[:TAGGED]->(t)",
                )
                .param("id", comment_id)
                .param("tag_ids", draft.tag_ids.clone())
                .param("user_id", user_id),
            )
            .await?;
        }

        txn.commit().await?;

        let saved = self.get_comments_by_ids(&[comment_id]).await?;
        saved
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("El comentario {comment_id} no existe tras guardarlo"))
    }

    async fn delete_comments(&self, user_id: i64, ids: &[i64]) -> Result<()> {
        self.graph
            .run(
                query(
                    "MATCH (c:Comment) WHERE c.id IN $ids AND c.user_id = $user_id
                     DETACH DELETE c",
                )
                .param("ids", ids.to_vec())
                .param("user_id", user_id),
            )
            .await?;
        Ok(())
    }
}
