#![allow(unused)]
#[allow(unused)]
mod support;

use ferrum_terminology::{db::TerminologyStore, models::CodeSystemVersion};
use support::{a_to_b, code_set, codes, diamond, TestEngine, CS_URL};

#[tokio::test]
async fn a_to_b_closures_include_the_seed() -> anyhow::Result<()> {
    let engine = TestEngine::new();
    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, a_to_b("cs-1"))
        .await?;

    assert_eq!(
        codes(&engine.service.find_codes_above_in_system(CS_URL, "B").await?),
        code_set(&["A", "B"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_below_in_system(CS_URL, "A").await?),
        code_set(&["A", "B"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_above_in_system(CS_URL, "A").await?),
        code_set(&["A"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_below_in_system(CS_URL, "B").await?),
        code_set(&["B"])
    );

    Ok(())
}

#[tokio::test]
async fn diamond_closures_walk_both_paths_once() -> anyhow::Result<()> {
    let engine = TestEngine::new();
    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, diamond("cs-1"))
        .await?;

    let above = engine.service.find_codes_above("cs-1", 1, "BOTTOM").await?;
    assert_eq!(above.len(), 4);
    assert_eq!(codes(&above), code_set(&["BOTTOM", "L", "R", "TOP"]));

    let below = engine.service.find_codes_below("cs-1", 1, "TOP").await?;
    assert_eq!(codes(&below), code_set(&["TOP", "L", "R", "BOTTOM"]));

    let below_left = engine.service.find_codes_below("cs-1", 1, "L").await?;
    assert_eq!(codes(&below_left), code_set(&["L", "BOTTOM"]));

    Ok(())
}

#[tokio::test]
async fn unknown_code_version_or_system_yields_nothing() -> anyhow::Result<()> {
    let engine = TestEngine::new();
    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, a_to_b("cs-1"))
        .await?;

    assert!(engine
        .service
        .find_codes_above_in_system(CS_URL, "Z")
        .await?
        .is_empty());
    assert!(engine
        .service
        .find_codes_below_in_system("http://x/unknown", "A")
        .await?
        .is_empty());
    assert!(engine
        .service
        .find_codes_below("cs-1", 7, "A")
        .await?
        .is_empty());
    assert!(engine
        .service
        .find_codes_above("cs-9", 1, "B")
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn codes_are_matched_exactly() -> anyhow::Result<()> {
    let engine = TestEngine::new();
    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, a_to_b("cs-1"))
        .await?;

    assert!(engine
        .service
        .find_codes_above_in_system(CS_URL, "b")
        .await?
        .is_empty());
    assert!(engine
        .service
        .find_codes_above_in_system(CS_URL, " B")
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn versions_are_queried_independently() -> anyhow::Result<()> {
    let engine = TestEngine::new();

    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, a_to_b("cs-1"))
        .await?;

    let mut second = CodeSystemVersion::for_resource("cs-1", 2);
    let root = second.add_root("ROOT", None);
    let a = second.add_child_concept(root, "A", None);
    second.add_child_concept(a, "B", None);
    engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, second)
        .await?;

    assert_eq!(
        codes(&engine.service.find_codes_above("cs-1", 1, "B").await?),
        code_set(&["A", "B"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_above("cs-1", 2, "B").await?),
        code_set(&["ROOT", "A", "B"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_above_in_system(CS_URL, "B").await?),
        code_set(&["ROOT", "A", "B"])
    );

    Ok(())
}

#[tokio::test]
async fn shared_concept_under_two_roots() -> anyhow::Result<()> {
    let engine = TestEngine::new();

    let mut version = CodeSystemVersion::for_resource("cs-1", 1);
    let first = version.add_root("R1", None);
    let second = version.add_root("R2", None);
    let shared = version.add_child_concept(first, "S", None);
    version.add_link(second, shared);
    version.add_child_concept(shared, "LEAF", None);

    let committed = engine
        .service
        .store_new_code_system_version("cs-1", CS_URL, version)
        .await?;
    assert_eq!(
        engine
            .store
            .list_concepts(committed.pid().expect("pid"))
            .await?
            .len(),
        4
    );

    assert_eq!(
        codes(&engine.service.find_codes_above_in_system(CS_URL, "LEAF").await?),
        code_set(&["LEAF", "S", "R1", "R2"])
    );
    assert_eq!(
        codes(&engine.service.find_codes_below_in_system(CS_URL, "R2").await?),
        code_set(&["R2", "S", "LEAF"])
    );

    Ok(())
}
