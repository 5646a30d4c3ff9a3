//! Tests for the `#[kiln::tracked]` attribute.

use std::path::{Path, PathBuf};

use kiln::{CompileRequest, DependencySet, RuntimeTracking, Tracked, TrackingEntry};

#[kiln::tracked(source = "physics.cpp", link_library = "-lm", include_file = "physics.h")]
pub struct Physics {
    pub gravity: f32,
}

#[kiln::tracked(source_extension = "cpp", modifiable_include)]
pub enum Renderer {
    Gl,
    Vulkan,
}

#[kiln::tracked()]
pub struct Untracked;

#[kiln::tracked(source = "a.cpp", source = "b.cpp", link_library = "-lm")]
struct Shared;

fn this_dir() -> &'static Path {
    Path::new(file!()).parent().unwrap()
}

#[test]
fn test_table_in_declaration_order() {
    let tracking = Physics::tracking();
    assert_eq!(tracking.max_num(), 3);

    assert_eq!(
        tracking.tracking_info(0).source.resolve(),
        Some(this_dir().join("physics.cpp"))
    );
    assert_eq!(tracking.tracking_info(1).link_library, Some("-lm"));
    assert_eq!(tracking.tracking_info(2).include_file, Some("physics.h"));
}

#[test]
fn test_lookup_past_end_is_none() {
    let tracking = Physics::tracking();
    assert_eq!(tracking.tracking_info(3), TrackingEntry::NONE);
    assert_eq!(tracking.tracking_info(1000), TrackingEntry::NONE);
}

#[test]
fn test_const_table_matches_runtime_lookup() {
    assert_eq!(Physics::TRACKING.as_slice().len(), Physics::tracking().max_num());
    assert_eq!(Untracked::TRACKING.as_slice().len(), 0);
    assert_eq!(Untracked::tracking().max_num(), 0);
}

#[test]
fn test_declaring_file_entries() {
    let tracking = Renderer::tracking();
    assert_eq!(tracking.max_num(), 2);

    let source = tracking.tracking_info(0).source.resolve().unwrap();
    assert_eq!(source, PathBuf::from(file!()).with_extension("cpp"));
    assert_eq!(tracking.tracking_info(1).include_file, Some(file!()));

    // The annotated items are still usable as normal.
    let physics = Physics { gravity: 9.8 };
    assert!(physics.gravity > 0.0);
    assert!(matches!(Renderer::Gl, Renderer::Gl));
    assert!(!matches!(Renderer::Vulkan, Renderer::Gl));
}

#[test]
fn test_types_have_independent_tables() {
    assert_eq!(Shared::tracking().max_num(), 3);
    assert_eq!(Physics::tracking().max_num(), 3);
    assert_ne!(
        Shared::tracking().tracking_info(0),
        Physics::tracking().tracking_info(0)
    );
}

#[test]
fn test_registry_contains_tracked_types() {
    let names: Vec<_> = kiln::tracked_entities().map(|e| e.name).collect();
    for name in ["Physics", "Renderer", "Untracked", "Shared"] {
        assert!(names.contains(&name), "{} missing from {:?}", name, names);
    }
}

#[test]
fn test_collect_deduplicates_across_types() {
    let deps = DependencySet::collect();

    let dir = this_dir();
    assert!(deps.sources.contains(&dir.join("physics.cpp")));
    assert!(deps.sources.contains(&dir.join("a.cpp")));
    assert!(deps.sources.contains(&dir.join("b.cpp")));

    let math = deps.link_libraries.iter().filter(|l| *l == "-lm").count();
    assert_eq!(math, 1);
    assert!(deps.include_files.contains(&PathBuf::from("physics.h")));
}

#[test]
fn test_request_with_dependencies() {
    let deps = DependencySet::from_tracking(Physics::tracking());
    let request = CompileRequest::new(["main.cpp"], "libhot.so").with_dependencies(&deps);

    assert_eq!(
        request.sources,
        vec![PathBuf::from("main.cpp"), this_dir().join("physics.cpp")]
    );
    assert_eq!(request.link_libraries, vec!["-lm".to_string()]);
}
