//! Serialización determinista de comentarios a JSON / CSV / XML.
//!
//! Pasos, en orden:
//!   1. Ordenar ascendente por (createdStr, id) — orden total.
//!   2. Proyectar cada comentario a un registro de exportación de esquema
//!      fijo: fuera `userId` y `tagIds`, dentro `tags` (rutas resueltas,
//!      ordenadas lexicográficamente) y timestamps en ISO-8601.
//!   3. Codificar según el formato pedido.
//!
//! Cualquier fallo del codificador se devuelve como error de serialización;
//! nunca se emiten bytes parciales.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{Comment, Emotion, Sentiment, Tag};

/// Formato de exportación soportado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xml,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "xml" => Ok(Self::Xml),
            other => Err(anyhow!("Formato de exportación no soportado: {other}")),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Xml => "application/xml",
        }
    }

    /// Nombre fijo del adjunto descargado.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Json => "comments.json",
            Self::Csv => "comments.csv",
            Self::Xml => "comments.xml",
        }
    }
}

/// Registro proyectado de exportación: la forma plana y sin campos internos
/// de un comentario. El esquema es fijo y explícito; las columnas del CSV
/// salen del orden de declaración de estos campos, nunca del primer registro.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: i64,
    pub text: String,
    pub created_str: String,
    pub modified_str: String,
    pub analyzed: bool,
    pub sentiment: Option<Sentiment>,
    pub emotion: Option<Emotion>,
    /// Rutas de tag resueltas, ordenadas lexicográficamente.
    pub tags: Vec<String>,
}

const CSV_HEADER: [&str; 8] = [
    "id",
    "text",
    "createdStr",
    "modifiedStr",
    "analyzed",
    "sentiment",
    "emotion",
    "tags",
];

/// Serializa la lista de comentarios al formato pedido.
pub fn serialize(
    comments: &[Comment],
    tag_index: &HashMap<i64, Tag>,
    format: ExportFormat,
) -> Result<Vec<u8>, CoreError> {
    let records = project(comments, tag_index);
    match format {
        ExportFormat::Json => encode_json(&records),
        ExportFormat::Csv => encode_csv(&records),
        ExportFormat::Xml => Ok(encode_xml(&records).into_bytes()),
    }
}

/// Ordena y proyecta los comentarios a registros de exportación.
fn project(comments: &[Comment], tag_index: &HashMap<i64, Tag>) -> Vec<ExportRecord> {
    let mut sorted: Vec<&Comment> = comments.iter().collect();
    sorted.sort_by(|a, b| {
        a.created_str
            .cmp(&b.created_str)
            .then_with(|| a.id.cmp(&b.id))
    });

    sorted
        .into_iter()
        .map(|comment| {
            // Un id de tag sin entrada en el índice se omite en silencio.
            let mut tags: Vec<String> = comment
                .tag_ids
                .iter()
                .filter_map(|id| tag_index.get(id).and_then(|t| t.path.clone()))
                .collect();
            tags.sort();

            ExportRecord {
                id: comment.id,
                text: comment.text.clone(),
                created_str: comment
                    .created_str
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                modified_str: comment
                    .modified_str
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                analyzed: comment.analyzed,
                sentiment: comment.sentiment,
                emotion: comment.emotion,
                tags,
            }
        })
        .collect()
}

/// JSON: array de registros con sangría de 4 espacios.
fn encode_json(records: &[ExportRecord]) -> Result<Vec<u8>, CoreError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    records.serialize(&mut serializer)?;
    Ok(buffer)
}

/// CSV: cabecera fija de esquema explícito; `tags` aplanado uniendo las rutas
/// con ";". Una lista vacía sigue emitiendo la fila de cabecera.
fn encode_csv(records: &[ExportRecord]) -> Result<Vec<u8>, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.id.to_string(),
            record.text.clone(),
            record.created_str.clone(),
            record.modified_str.clone(),
            record.analyzed.to_string(),
            record.sentiment.map(|s| s.as_str()).unwrap_or("").to_string(),
            record.emotion.map(|e| e.as_str()).unwrap_or("").to_string(),
            record.tags.join(";"),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| CoreError::Serialization(e.to_string()))
}

/// XML: un elemento por comentario con el id como atributo, el texto como
/// bloque CDATA (para conservar tal cual los caracteres conflictivos) y un
/// hijo `<tag>` por ruta resuelta.
fn encode_xml(records: &[ExportRecord]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<comments>\n");
    for record in records {
        xml.push_str(&format!("    <comment id=\"{}\">\n", record.id));
        xml.push_str(&format!(
            "        <text><![CDATA[{}]]></text>\n",
            escape_cdata(&record.text)
        ));
        xml.push_str(&format!(
            "        <createdStr>{}</createdStr>\n",
            record.created_str
        ));
        xml.push_str(&format!(
            "        <modifiedStr>{}</modifiedStr>\n",
            record.modified_str
        ));
        xml.push_str(&format!(
            "        <analyzed>{}</analyzed>\n",
            record.analyzed
        ));
        if let Some(sentiment) = record.sentiment {
            xml.push_str(&format!(
                "        <sentiment>{}</sentiment>\n",
                sentiment.as_str()
            ));
        }
        if let Some(emotion) = record.emotion {
            xml.push_str(&format!(
                "        <emotion>{}</emotion>\n",
                emotion.as_str()
            ));
        }
        for tag in &record.tags {
            xml.push_str(&format!("        <tag>{}</tag>\n", escape_xml(tag)));
        }
        xml.push_str("    </comment>\n");
    }
    xml.push_str("</comments>\n");
    xml
}

/// Un "]]>" dentro del texto cerraría el bloque: se parte en dos CDATA.
fn escape_cdata(content: &str) -> String {
    content.replace("]]>", "]]]]><![CDATA[>")
}

fn escape_xml(content: &str) -> String {
    content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{at, comment, tag};
    use crate::hierarchy::build_tag_index;
    use pretty_assertions::assert_eq;

    fn index() -> HashMap<i64, Tag> {
        build_tag_index(&[
            tag(1, "A", None, 7),
            tag(2, "B", Some(1), 7),
        ])
    }

    #[test]
    fn json_round_trip_keeps_deterministic_order() {
        let mut early = comment(2, 7, "primero", vec![2, 1]);
        early.created_str = at(100);
        let mut tied_low = comment(1, 7, "empate, id menor", vec![1]);
        tied_low.created_str = at(200);
        let mut tied_high = comment(5, 7, "empate, id mayor", vec![1]);
        tied_high.created_str = at(200);

        let bytes = serialize(&[tied_high, early, tied_low], &index(), ExportFormat::Json).unwrap();
        let parsed: Vec<ExportRecord> = serde_json::from_slice(&bytes).unwrap();

        let ids: Vec<i64> = parsed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 5]);
        // `tags` llega ordenado lexicográficamente.
        assert_eq!(parsed[0].tags, vec!["A".to_string(), "A/B".to_string()]);
    }

    #[test]
    fn json_uses_four_space_indentation_and_drops_internal_fields() {
        let bytes = serialize(&[comment(1, 7, "hola", vec![1])], &index(), ExportFormat::Json)
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\n    {"));
        assert!(!text.contains("userId"));
        assert!(!text.contains("tagIds"));
    }

    #[test]
    fn unresolved_tag_ids_are_silently_omitted() {
        let bytes = serialize(
            &[comment(1, 7, "hola", vec![1, 999])],
            &index(),
            ExportFormat::Json,
        )
        .unwrap();
        let parsed: Vec<ExportRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed[0].tags, vec!["A".to_string()]);
    }

    #[test]
    fn csv_header_follows_the_fixed_schema_even_for_empty_input() {
        let bytes = serialize(&[], &index(), ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "id,text,createdStr,modifiedStr,analyzed,sentiment,emotion,tags"
        );
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn csv_flattens_tags_with_semicolons() {
        let bytes = serialize(
            &[comment(1, 7, "con tags", vec![1, 2])],
            &index(),
            ExportFormat::Csv,
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.ends_with("A;A/B"));
    }

    #[test]
    fn xml_wraps_text_in_cdata_and_repeats_tag_children() {
        let bytes = serialize(
            &[comment(3, 7, "texto con <marcado> & cosas", vec![1, 2])],
            &index(),
            ExportFormat::Xml,
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<comment id=\"3\">"));
        assert!(text.contains("<![CDATA[texto con <marcado> & cosas]]>"));
        assert!(text.contains("<tag>A</tag>"));
        assert!(text.contains("<tag>A/B</tag>"));
    }

    #[test]
    fn xml_splits_embedded_cdata_terminators() {
        let bytes = serialize(
            &[comment(1, 7, "cierra ]]> aquí", vec![])],
            &index(),
            ExportFormat::Xml,
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("cierra ]]]]><![CDATA[> aquí"));
    }

    #[test]
    fn format_metadata_is_fixed_per_format() {
        assert_eq!(ExportFormat::Json.content_type(), "application/json");
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(ExportFormat::Xml.content_type(), "application/xml");
        assert_eq!(ExportFormat::Json.filename(), "comments.json");
        assert_eq!(ExportFormat::Csv.filename(), "comments.csv");
        assert_eq!(ExportFormat::Xml.filename(), "comments.xml");
        assert!(ExportFormat::from_str("yaml").is_err());
    }
}
