//! Structural validation of a code system version before it is stored
//!
//! The concept graph must be a DAG: a concept reached again through a second
//! parent is shared structure, a concept reached while it is still on the
//! current walk is a cycle.

use crate::{
    models::{CodeSystemVersion, ConceptId},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Check that every concept belongs to `version`, has a code, is reachable
/// from a root, and that the parent/child links contain no cycle.
pub fn validate_concepts_for_storage(version: &CodeSystemVersion) -> Result<()> {
    for concept in version.concepts() {
        if concept.version_key != version.key() {
            return Err(Error::MalformedConcept(format!(
                "Codesystem contains a code which does not reference the codesystem: {}",
                concept.code
            )));
        }
        if concept.code.trim().is_empty() {
            return Err(Error::MalformedConcept(
                "Codesystem contains a concept without a code".to_string(),
            ));
        }
    }

    for link in version.links() {
        if !version.contains(link.parent) || !version.contains(link.child) {
            return Err(Error::MalformedConcept(format!(
                "Link {} -> {} references a concept outside this code system version",
                link.parent.index(),
                link.child.index()
            )));
        }
    }

    if let Some(root) = version.roots().iter().find(|r| !version.contains(**r)) {
        return Err(Error::MalformedConcept(format!(
            "Root {} references a concept outside this code system version",
            root.index()
        )));
    }

    let children = version.child_index();
    let mut marks = vec![Mark::Unvisited; version.concepts().len()];

    for &root in version.roots() {
        walk(version, &children, &mut marks, root)?;
    }

    let unreachable: Vec<ConceptId> = marks
        .iter()
        .enumerate()
        .filter(|(_, mark)| **mark == Mark::Unvisited)
        .map(|(index, _)| ConceptId(index))
        .collect();

    // Cycles that hang off no root are still reported as cycles.
    for &id in &unreachable {
        walk(version, &children, &mut marks, id)?;
    }

    if let Some(first) = unreachable.first().and_then(|id| version.concept(*id)) {
        return Err(Error::MalformedConcept(format!(
            "Concept {} is not reachable from any root concept",
            first.code
        )));
    }

    tracing::debug!(
        concepts = version.concepts().len(),
        links = version.links().len(),
        roots = version.roots().len(),
        "Code system version is valid for storage"
    );

    Ok(())
}

fn walk(
    version: &CodeSystemVersion,
    children: &[Vec<ConceptId>],
    marks: &mut [Mark],
    start: ConceptId,
) -> Result<()> {
    if marks[start.index()] != Mark::Unvisited {
        return Ok(());
    }

    marks[start.index()] = Mark::OnStack;
    let mut stack: Vec<(ConceptId, usize)> = vec![(start, 0)];

    while let Some(frame) = stack.last_mut() {
        let (id, next) = *frame;
        match children[id.index()].get(next) {
            Some(&child) => {
                frame.1 += 1;
                match marks[child.index()] {
                    Mark::OnStack => {
                        let code = version
                            .concept(child)
                            .map(|c| c.code.clone())
                            .unwrap_or_default();
                        return Err(Error::CycleDetected { code });
                    }
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[child.index()] = Mark::OnStack;
                        stack.push((child, 0));
                    }
                }
            }
            None => {
                marks[id.index()] = Mark::Done;
                stack.pop();
            }
        }
    }

    Ok(())
}
