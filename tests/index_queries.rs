//! End-to-end indexing and lookup through the tag cache

mod common;

use common::{path_str, Project, MY_CLASS};
use phptags::indexer::WalkOutcome;
use phptags::parser::parse_expression;

#[test]
fn exact_member_lookup_after_extraction() {
    let project = Project::new();
    project.write("C.php", "<?php\nclass C {\n    public function m() {}\n}\n");
    project.index();

    let tags = project.cache().exact_tags("C::m", &[]);
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].identifier, "m");
    assert_eq!(tags[0].class_name, "C");
}

#[test]
fn walking_unchanged_file_is_idempotent() {
    let project = Project::new();
    let path = project.write("MyClass.php", MY_CLASS);
    let full_path = path_str(&path);

    let first = project.index();
    assert_eq!(first.parsed, 1);
    let mut before: Vec<String> = project.store.tags_for_file(&full_path).unwrap().into_iter().map(|t| t.key).collect();
    before.sort();

    let second = project.index();
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.parsed, 0);

    // a forced re-parse after wiping yields the same set
    let mut extractor = project.extractor();
    extractor.wipe().unwrap();
    assert!(matches!(extractor.walk(&path).unwrap(), WalkOutcome::Parsed { .. }));
    extractor.end_search();
    drop(extractor);

    let mut after: Vec<String> = project.store.tags_for_file(&full_path).unwrap().into_iter().map(|t| t.key).collect();
    after.sort();
    assert!(!before.is_empty());
    assert_eq!(before, after);
}

#[test]
fn open_buffer_hides_members_it_no_longer_has() {
    let project = Project::new();
    let path = project.write("MyClass.php", MY_CLASS);
    project.index();
    let cache = project.cache();

    let buffer = "<?php\nnamespace Util;\n\nclass MyClass\n{\n    public function work($amount = 1) {}\n}\n\n$obj = new MyClass();\n";
    let file_id = path_str(&path);
    cache.register_working(&file_id, Some(&path), false);
    cache.update_working(&file_id, buffer);
    let cursor = buffer.chars().count();

    let gone = cache.resource_matches(&file_id, &parse_expression("$obj->removed"), cursor, &[]);
    assert_eq!(gone.error, None);
    assert!(gone.tags.is_empty());

    let kept = cache.resource_matches(&file_id, &parse_expression("$obj->work"), cursor, &[]);
    assert_eq!(kept.tags.len(), 1);
    assert_eq!(kept.tags[0].key, "MyClass::work");

    // hidden from every query while the buffer is open, though still stored
    assert!(cache.exact_tags("MyClass::removed", &[]).is_empty());
    assert_eq!(project.store.tags_for_file(&file_id).unwrap().iter().filter(|t| t.identifier == "removed").count(), 1);
}

#[test]
fn aliased_and_qualified_names_resolve_to_the_same_tag() {
    let project = Project::new();
    project.write("Util/MyClass.php", MY_CLASS);
    project.index();
    let cache = project.cache();

    let buffer = "<?php\nnamespace App;\n\nuse Util\\MyClass as UtilClass;\n\n$a = new UtilClass();\n$b = new \\Util\\MyClass();\n";
    cache.register_working("buffer", None, true);
    cache.update_working("buffer", buffer);
    let cursor = buffer.chars().count();

    let aliased = cache.resource_matches("buffer", &parse_expression("$a->work"), cursor, &[]);
    let qualified = cache.resource_matches("buffer", &parse_expression("$b->work"), cursor, &[]);
    assert_eq!(aliased.tags.len(), 1);
    assert_eq!(aliased.tags, qualified.tags);
    assert_eq!(aliased.tags[0].fully_qualified_class(), "\\Util\\MyClass");
}

#[test]
fn near_match_returns_prefix_matches_in_order() {
    let project = Project::new();
    project.write("ActionYou.php", "<?php\nclass ActionYou {}\n");
    project.write("ActionMy.php", "<?php\nclass ActionMy {}\n");
    project.write("ActionThey.php", "<?php\nclass ActionThey {}\n");
    project.write("Other.php", "<?php\nclass Other {}\n");
    project.index();

    let names: Vec<String> = project
        .cache()
        .near_match_tags("Action", &[])
        .into_iter()
        .map(|t| t.identifier)
        .collect();
    assert_eq!(names, vec!["ActionMy", "ActionThey", "ActionYou"]);
}

#[test]
fn rename_moves_tags_without_reparsing() {
    let project = Project::new();
    let old = project.write("Old.php", "<?php\nclass Renamed {\n    public function keep() {}\n}\n");
    project.index();

    let new = project.src.join("New.php");
    std::fs::rename(&old, &new).unwrap();
    // different content on disk proves the tags were moved, not re-parsed
    std::fs::write(&new, "<?php\nclass Renamed {}\n").unwrap();

    let mut extractor = project.extractor();
    assert!(extractor.rename_file(&old, &new).unwrap());
    extractor.end_search();
    drop(extractor);

    let cache = project.cache();
    let class = cache.exact_tags("Renamed", &[]);
    assert_eq!(class.len(), 1);
    assert_eq!(class[0].full_path, path_str(&new));
    assert_eq!(cache.exact_tags("Renamed::keep", &[]).len(), 1);
    assert!(project.store.tags_for_file(&path_str(&old)).unwrap().is_empty());
}

#[test]
fn go_to_file_and_stats() {
    let project = Project::new();
    project.write("MyClass.php", MY_CLASS);
    project.write("assets/site.css", "body {}");
    let stats = project.index();
    assert_eq!(stats.parsed, 1);
    assert_eq!(stats.recorded, 1);

    let cache = project.cache();
    let files = cache.near_match_files("si", &[]).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].full_path.ends_with("site.css"));

    let store = cache.stats().unwrap().store.unwrap();
    assert_eq!(store.files, 2);
    assert_eq!(store.parsed_files, 1);
}
