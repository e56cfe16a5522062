//! Comparación estadística entre dos selecciones de tags.
//!
//! El valor del motor está en la aritmética de solape por
//! inclusión-exclusión (`|L ∩ R| = |L| + |R| - |U|`, sin segunda consulta) y
//! en los histogramas de dominio fijo; ambos son exactos, sin estimaciones.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::hierarchy;
use crate::models::{Comment, Emotion, Sentiment, Tag};
use crate::retrieval;
use crate::store::{CommentStore, TagStore};

/// Solape global entre ambas selecciones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralStats {
    pub total_amount: usize,
    pub common_amount: usize,
}

/// Histograma de emociones sobre claves enumeradas fijas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmotionCounts {
    pub joy: u64,
    pub anger: u64,
    pub sadness: u64,
    pub fear: u64,
    pub surprise: u64,
    pub neutral: u64,
}

/// Histograma de sentimientos sobre claves enumeradas fijas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

/// Agregado de un lado de la comparación, con el tag resuelto embebido.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagStat {
    pub tag: Tag,
    pub amount: usize,
    pub analyzed: usize,
    pub average_length: f64,
    pub emotions: EmotionCounts,
    pub sentiments: SentimentCounts,
}

/// Resultado estructurado del motor de comparación.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub general: GeneralStats,
    pub first: TagStat,
    pub second: TagStat,
}

/// Compara las estadísticas agregadas de dos selecciones de tags.
///
/// 1. Resuelve ambos tags; menos de dos registros distintos (ids inválidos o
///    `left == right`) es condición de tag no encontrado.
/// 2. Recupera `U`, los comentarios de la clausura unión (ya deduplicados).
/// 3. Particiona en `L` / `R` según la intersección de `tag_ids` con cada
///    clausura; un comentario puede caer en ambos lados.
/// 4. `totalAmount = |U|`, `commonAmount = |L| + |R| - |U|`.
pub async fn compare(
    tag_store: &dyn TagStore,
    comment_store: &dyn CommentStore,
    user_id: i64,
    left_tag_id: i64,
    right_tag_id: i64,
) -> Result<ComparisonReport, CoreError> {
    // Los dos tags de la comparación y la instantánea del bosque del usuario
    // se piden en paralelo; la clausura debe resolverse antes de tocar los
    // comentarios.
    let compared_ids = [left_tag_id, right_tag_id];
    let (tags, snapshot) = tokio::try_join!(
        tag_store.get_tags_by_ids(&compared_ids),
        tag_store.get_tags_by_user(user_id),
    )?;

    let left_tag = tags.iter().find(|t| t.id == left_tag_id).cloned();
    let right_tag = tags.iter().find(|t| t.id == right_tag_id).cloned();
    let (left_tag, right_tag) = match (left_tag, right_tag) {
        (Some(l), Some(r)) if tags.len() >= 2 => (l, r),
        _ => {
            return Err(CoreError::TagNotFound {
                ids: vec![left_tag_id, right_tag_id],
            })
        }
    };

    let left_closure = hierarchy::closure(&HashSet::from([left_tag_id]), &snapshot);
    let right_closure = hierarchy::closure(&HashSet::from([right_tag_id]), &snapshot);

    let union = retrieval::find_by_tags(
        comment_store,
        &snapshot,
        &HashSet::from([left_tag_id, right_tag_id]),
    )
    .await?;

    let left_side: Vec<&Comment> = union
        .iter()
        .filter(|c| c.tag_ids.iter().any(|id| left_closure.contains(id)))
        .collect();
    let right_side: Vec<&Comment> = union
        .iter()
        .filter(|c| c.tag_ids.iter().any(|id| right_closure.contains(id)))
        .collect();

    let general = GeneralStats {
        total_amount: union.len(),
        common_amount: left_side.len() + right_side.len() - union.len(),
    };

    Ok(ComparisonReport {
        general,
        first: aggregate(left_tag, &left_side),
        second: aggregate(right_tag, &right_side),
    })
}

/// Agrega las métricas de un lado. La media de longitud se redondea a tres
/// decimales y vale 0 para un lado vacío (guardia contra división por cero);
/// un sentimiento o emoción nulos no incrementan ningún bucket.
fn aggregate(tag: Tag, side: &[&Comment]) -> TagStat {
    let mut stat = TagStat {
        tag,
        amount: side.len(),
        analyzed: 0,
        average_length: 0.0,
        emotions: EmotionCounts::default(),
        sentiments: SentimentCounts::default(),
    };

    let mut total_length: usize = 0;
    for comment in side {
        if comment.analyzed {
            stat.analyzed += 1;
        }
        match comment.emotion {
            Some(Emotion::Joy) => stat.emotions.joy += 1,
            Some(Emotion::Anger) => stat.emotions.anger += 1,
            Some(Emotion::Sadness) => stat.emotions.sadness += 1,
            Some(Emotion::Fear) => stat.emotions.fear += 1,
            Some(Emotion::Surprise) => stat.emotions.surprise += 1,
            Some(Emotion::Neutral) => stat.emotions.neutral += 1,
            None => {}
        }
        match comment.sentiment {
            Some(Sentiment::Positive) => stat.sentiments.positive += 1,
            Some(Sentiment::Negative) => stat.sentiments.negative += 1,
            Some(Sentiment::Neutral) => stat.sentiments.neutral += 1,
            None => {}
        }
        total_length += comment.text.chars().count();
    }

    if !side.is_empty() {
        let mean = total_length as f64 / side.len() as f64;
        stat.average_length = (mean * 1000.0).round() / 1000.0;
    }
    stat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{analyzed, comment, tag, InMemoryStore};
    use pretty_assertions::assert_eq;

    const USER: i64 = 7;

    fn store_with(comments: Vec<Comment>) -> InMemoryStore {
        InMemoryStore::new(
            vec![
                tag(1, "A", None, USER),
                tag(2, "B", None, USER),
                tag(3, "A-hijo", Some(1), USER),
            ],
            comments,
        )
    }

    #[tokio::test]
    async fn overlap_follows_inclusion_exclusion() {
        // A con 2 comentarios, B con 1, uno compartido: U=2, común = 2+1-2 = 1.
        let store = store_with(vec![
            comment(10, USER, "solo A", vec![1]),
            comment(11, USER, "compartido", vec![1, 2]),
        ]);

        let report = compare(&store, &store, USER, 1, 2).await.unwrap();
        assert_eq!(report.general.total_amount, 2);
        assert_eq!(report.general.common_amount, 1);
        assert_eq!(report.first.amount, 2);
        assert_eq!(report.second.amount, 1);
    }

    #[tokio::test]
    async fn common_amount_equals_direct_intersection() {
        let store = store_with(vec![
            comment(10, USER, "a", vec![1]),
            comment(11, USER, "ab", vec![1, 2]),
            comment(12, USER, "ab también", vec![1, 2]),
            comment(13, USER, "b", vec![2]),
        ]);

        let report = compare(&store, &store, USER, 1, 2).await.unwrap();

        // Verificación independiente por intersección directa de conjuntos.
        let left: std::collections::HashSet<i64> = [10, 11, 12].into();
        let right: std::collections::HashSet<i64> = [11, 12, 13].into();
        let expected = left.intersection(&right).count();
        assert_eq!(report.general.common_amount, expected);
        assert!(report.general.common_amount <= report.first.amount.min(report.second.amount));
    }

    #[tokio::test]
    async fn descendant_membership_counts_for_the_parent_side() {
        let store = store_with(vec![comment(10, USER, "en el hijo de A", vec![3])]);

        let report = compare(&store, &store, USER, 1, 2).await.unwrap();
        assert_eq!(report.first.amount, 1);
        assert_eq!(report.second.amount, 0);
        assert_eq!(report.general.total_amount, 1);
        assert_eq!(report.general.common_amount, 0);
    }

    #[tokio::test]
    async fn average_length_is_rounded_to_three_decimals() {
        let store = store_with(vec![
            comment(10, USER, "0123456789", vec![1]),          // 10 caracteres
            comment(11, USER, "01234567890123456789", vec![1]), // 20 caracteres
        ]);

        let report = compare(&store, &store, USER, 1, 2).await.unwrap();
        assert_eq!(report.first.average_length, 15.0);
        assert_eq!(report.second.average_length, 0.0); // lado vacío, sin división
    }

    #[tokio::test]
    async fn histograms_skip_unanalyzed_comments() {
        let store = store_with(vec![
            analyzed(
                comment(10, USER, "bien", vec![1]),
                Sentiment::Positive,
                Emotion::Joy,
            ),
            analyzed(
                comment(11, USER, "mal", vec![1]),
                Sentiment::Negative,
                Emotion::Anger,
            ),
            comment(12, USER, "sin analizar", vec![1]),
        ]);

        let report = compare(&store, &store, USER, 1, 2).await.unwrap();
        assert_eq!(report.first.analyzed, 2);
        assert_eq!(report.first.emotions.joy, 1);
        assert_eq!(report.first.emotions.anger, 1);
        assert_eq!(report.first.emotions.neutral, 0);
        assert_eq!(report.first.sentiments.positive, 1);
        assert_eq!(report.first.sentiments.negative, 1);
        assert_eq!(report.first.sentiments.neutral, 0);
    }

    #[tokio::test]
    async fn missing_or_identical_tags_are_a_not_found_condition() {
        let store = store_with(vec![]);

        assert!(matches!(
            compare(&store, &store, USER, 1, 99).await,
            Err(CoreError::TagNotFound { .. })
        ));
        assert!(matches!(
            compare(&store, &store, USER, 1, 1).await,
            Err(CoreError::TagNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn report_serializes_with_the_contract_field_names() {
        let store = store_with(vec![comment(10, USER, "hola", vec![1])]);
        let report = compare(&store, &store, USER, 1, 2).await.unwrap();

        let value = serde_json::to_value(&report).unwrap();
        assert!(value["general"]["totalAmount"].is_number());
        assert!(value["general"]["commonAmount"].is_number());
        for side in ["first", "second"] {
            assert!(value[side]["tag"]["id"].is_number());
            assert!(value[side]["averageLength"].is_number());
            assert!(value[side]["emotions"]["joy"].is_number());
            assert!(value[side]["sentiments"]["positive"].is_number());
        }
    }
}
