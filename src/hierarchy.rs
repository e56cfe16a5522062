//! Resolución de la jerarquía de tags: clausura descendente y rutas derivadas.
//!
//! Ambas funciones son puras sobre una instantánea del bosque de tags del
//! usuario; no tocan el almacenamiento.

use std::collections::{HashMap, HashSet};

use crate::models::Tag;

/// Calcula la clausura transitiva descendente de un conjunto de tags: cada
/// raíz más todos sus descendientes siguiendo la relación padre→hijo.
///
/// - Un id sin entrada en la instantánea se conserva tal cual (sin descendientes).
/// - Un bosque malformado con ciclos no provoca bucle infinito: el conjunto
///   de visitados corta cualquier revisita.
pub fn closure(roots: &HashSet<i64>, tags: &[Tag]) -> HashSet<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for tag in tags {
        if let Some(parent_id) = tag.parent_id {
            children.entry(parent_id).or_default().push(tag.id);
        }
    }

    let mut visited: HashSet<i64> = HashSet::new();
    let mut pending: Vec<i64> = roots.iter().copied().collect();
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(child_ids) = children.get(&id) {
            pending.extend(child_ids.iter().copied());
        }
    }
    visited
}

/// Deriva la ruta de cada tag: nombres de ancestros unidos por "/" desde la
/// raíz del bosque hasta el propio tag. Se calcula bajo demanda para
/// exportación y visualización, nunca se persiste.
///
/// Un padre inexistente corta la cadena en ese punto; un ciclo también
/// (mismo guardado de visitados que en [`closure`]).
pub fn tag_paths(tags: &[Tag]) -> HashMap<i64, String> {
    let by_id: HashMap<i64, &Tag> = tags.iter().map(|t| (t.id, t)).collect();

    let mut paths = HashMap::with_capacity(tags.len());
    for tag in tags {
        let mut segments = vec![tag.name.as_str()];
        let mut seen: HashSet<i64> = HashSet::from([tag.id]);
        let mut current = tag.parent_id;
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            match by_id.get(&parent_id) {
                Some(parent) => {
                    segments.push(parent.name.as_str());
                    current = parent.parent_id;
                }
                None => break,
            }
        }
        segments.reverse();
        paths.insert(tag.id, segments.join("/"));
    }
    paths
}

/// Rellena el campo derivado `path` de cada tag y devuelve el índice id → tag.
pub fn build_tag_index(tags: &[Tag]) -> HashMap<i64, Tag> {
    let paths = tag_paths(tags);
    tags.iter()
        .map(|tag| {
            let mut tag = tag.clone();
            tag.path = paths.get(&tag.id).cloned();
            (tag.id, tag)
        })
        .collect()
}
