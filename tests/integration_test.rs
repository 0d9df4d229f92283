//! Integration tests for cxxpy build functionality
//!
//! These tests build small extension-module projects in temporary directories with the
//! GCC profile. They skip when `g++` is not on `PATH`. The module sources define
//! `PyInit_<name>` themselves, so no Python headers are needed.

use cxxpy::build::{COMPILE_COMMANDS_FILE, CompileCommandsEmitter};
use cxxpy::builder::BuilderConfig;
use cxxpy::error::BuildError;
use cxxpy::toolchain::{CompilerFamily, PythonEnv};
use cxxpy::types::{FileKind, Library, Macro};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn have_gxx() -> bool {
    Command::new("g++").arg("--version").output().is_ok()
}

fn fake_python() -> PythonEnv {
    PythonEnv {
        include_dirs: Vec::new(),
        ext_suffix: ".so".to_string(),
        version: "3.test".to_string(),
        lib_dirs: Vec::new(),
        libpython: None,
    }
}

fn write_aged(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    set_mtime(path, SystemTime::now() - Duration::from_secs(120));
}

fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

/// `src/a.cpp` includes `include/shared.h`; `src/b.cpp` includes nothing.
fn create_test_project(name: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create test directory");
    let root = dir.path();

    write_aged(
        &root.join("include/shared.h"),
        "#pragma once\ninline int shared_value() { return 40; }\n",
    );
    write_aged(
        &root.join("src/a.cpp"),
        "#include \"shared.h\"\nint value_a() { return shared_value(); }\n",
    );
    write_aged(&root.join("src/b.cpp"), "int value_b() { return 2; }\n");
    write_aged(
        &root.join("src/module.cpp"),
        &format!(
            "int value_a();\nint value_b();\nextern \"C\" int PyInit_{}() {{ return value_a() + value_b(); }}\n",
            name
        ),
    );
    dir
}

fn configure(name: &str, root: &Path) -> BuilderConfig {
    let mut config = BuilderConfig::for_family(name, root, CompilerFamily::GCC);
    config.python = Some(fake_python());
    config.include_dirs.push("include".to_string());
    config.add_files(&["a.cpp", "b.cpp"], Some(Path::new("src")), None);
    config.set_main_file("src/module.cpp", None);
    config
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

#[test]
fn test_build_is_idempotent() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("idem");
    let mut config = configure("idem", project.path());

    let first = config.build(Some(4)).expect("first build failed");
    assert!(first.module.exists(), "module should be linked");
    assert_eq!(first.module, project.path().join("build").join("idem.so"));
    assert_eq!(first.compiled.len(), 3);
    assert!(first.linked);
    assert!(
        project
            .path()
            .join("build/libobjs-static3.test.a")
            .exists()
    );

    let second = config.build(Some(4)).expect("second build failed");
    assert!(second.compiled.is_empty(), "nothing should recompile");
    assert!(!second.linked, "nothing should relink");
}

#[test]
fn test_header_touch_rebuilds_dependents_only() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("touch");
    let mut config = configure("touch", project.path());
    config.build(None).expect("initial build failed");

    set_mtime(
        &project.path().join("include/shared.h"),
        SystemTime::now() + Duration::from_secs(30),
    );

    let rebuilt = config.build(None).expect("rebuild failed");
    assert_eq!(file_names(&rebuilt.compiled), vec!["a.cpp"]);
    assert!(rebuilt.linked, "a recompiled archive member forces a relink");
}

#[test]
fn test_compile_failure_stops_build_and_removes_module() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("broken");
    let mut config = configure("broken", project.path());
    let built = config.build(Some(2)).expect("initial build failed");
    assert!(built.module.exists());
    let archive = project.path().join("build/libobjs-static3.test.a");
    let archived_at = fs::metadata(&archive).unwrap().modified().unwrap();

    write_aged(
        &project.path().join("src/b.cpp"),
        "int value_b() { return not_declared_anywhere; }\n",
    );
    set_mtime(
        &project.path().join("src/b.cpp"),
        SystemTime::now() + Duration::from_secs(30),
    );

    match config.build(Some(1)) {
        Err(BuildError::Compile { failure, .. }) => {
            assert!(failure.file.ends_with("src/b.cpp"));
            assert!(failure.output.contains("not_declared_anywhere"));
            assert!(failure.command.contains("g++"));
        }
        other => panic!("expected a compile failure, got {:?}", other),
    }
    assert!(!built.module.exists(), "failed build must not leave a module");
    assert_eq!(
        fs::metadata(&archive).unwrap().modified().unwrap(),
        archived_at,
        "a failed compile never reaches the archive"
    );
}

#[test]
fn test_detect_gates_library_and_macros() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("detect");
    let mut config = configure("detect", project.path());
    let before = config.libs.clone();

    let have = Macro::new("HAVE_CMATH", Some("1".to_string()));
    assert!(config.detect("cmath", Some("m"), &[have.clone()]));
    assert!(config.detect("cmath", Some("m"), &[have]));
    let m_count = config.libs.iter().filter(|l| l.name == "m").count();
    assert_eq!(m_count, 1, "library is registered exactly once");
    assert!(config.macros.contains("HAVE_CMATH"));

    let libs = config.libs.clone();
    let macros = config.macros.clone();
    assert!(!config.detect(
        "cxxpy_no_such_header.h",
        Some("nosuchlib"),
        &[Macro::new("HAVE_NOTHING", None)]
    ));
    assert_eq!(config.libs, libs);
    assert_eq!(config.macros, macros);
    assert_ne!(config.libs, before);

    let output = config.build(None).expect("build with detected library failed");
    let main = output.records.last().unwrap();
    assert!(main.arguments.contains(&"-DHAVE_CMATH=1".to_string()));
}

#[test]
fn test_compile_commands_lists_main_once_and_last() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("single");
    let mut config = configure("single", project.path());
    config.add_files(&["src/module.cpp"], None, None);

    let output = config.build(None).expect("build failed");
    assert_eq!(output.compile_commands, project.path().join(COMPILE_COMMANDS_FILE));

    let records = CompileCommandsEmitter::load(&output.compile_commands).unwrap();
    let main = project.path().join("src/module.cpp");
    assert_eq!(records.iter().filter(|r| r.file == main).count(), 1);
    assert_eq!(records.last().unwrap().file, main);
    assert_eq!(records.len(), 3);
    assert!(
        records
            .iter()
            .all(|r| r.arguments.iter().any(|a| a.starts_with("-I") && a.ends_with("include")))
    );
}

#[test]
fn test_compile_commands_independent_of_worker_count() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("workers");
    let mut config = configure("workers", project.path());
    for i in 0..6 {
        let path = project.path().join(format!("src/extra{}.cpp", i));
        write_aged(&path, &format!("int extra_{}() {{ return {}; }}\n", i, i));
        config.add_files(&[path], None, None);
    }

    config.build(Some(1)).expect("serial build failed");
    let serial = fs::read_to_string(project.path().join(COMPILE_COMMANDS_FILE)).unwrap();

    cxxpy::build::clean(project.path()).unwrap();
    let output = config.build(Some(8)).expect("parallel build failed");
    let parallel = fs::read_to_string(project.path().join(COMPILE_COMMANDS_FILE)).unwrap();

    assert_eq!(output.compiled.len(), 9);
    assert_eq!(serial, parallel);
}

#[test]
fn test_embedded_resource_is_linked() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_aged(&root.join("assets/data.txt"), "hello");
    write_aged(
        &root.join("src/module.cpp"),
        "extern \"C\" unsigned char const data_txt_content[];\n\
         extern \"C\" unsigned int const data_txt_size;\n\
         extern \"C\" int PyInit_res() { return data_txt_content[0] + (int)data_txt_size; }\n",
    );

    let mut config = BuilderConfig::for_family("res", root, CompilerFamily::GCC);
    config.python = Some(fake_python());
    config.add_files(&["assets/data.txt"], None, Some(FileKind::Embed));
    config.set_main_file("src/module.cpp", None);

    let output = config.build(None).expect("build with embedded resource failed");
    assert!(output.module.exists());
    assert!(
        root.join("build/objs3.test/assets/data.txt.c").exists(),
        "generated source is kept next to its object"
    );

    let again = config.build(None).unwrap();
    assert!(again.compiled.is_empty());
}

#[test]
fn test_missing_main_file_is_configuration_error() {
    let project = create_test_project("nomain");
    let mut config = BuilderConfig::for_family("nomain", project.path(), CompilerFamily::GCC);
    config.python = Some(fake_python());
    config.add_files(&["src/a.cpp"], None, None);

    match config.build(None) {
        Err(BuildError::Configuration(msg)) => assert!(msg.contains("main")),
        other => panic!("expected a configuration error, got {:?}", other),
    }
    assert!(!project.path().join("build").exists(), "nothing ran");
}

#[test]
fn test_link_failure_reports_missing_library() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("linkfail");
    let mut config = configure("linkfail", project.path());
    config.libs.push(Library::new("cxxpy_missing_library"));

    match config.build(None) {
        Err(BuildError::Link(failure)) => {
            assert!(failure.output.contains("cxxpy_missing_library"));
            assert!(failure.command.contains("-shared"));
        }
        other => panic!("expected a link failure, got {:?}", other),
    }
    assert!(!project.path().join("build/linkfail.so").exists());
    assert!(
        !project.path().join(COMPILE_COMMANDS_FILE).exists(),
        "the database is only written after a successful build"
    );
}

#[test]
fn test_reassigned_main_file_is_listed_once() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("swap");
    let root = project.path();
    write_aged(
        &root.join("src/module_v2.cpp"),
        "int value_a();\nextern \"C\" int PyInit_swap() { return value_a() * 2; }\n",
    );
    let mut config = configure("swap", root);
    config.set_main_file("src/module_v2.cpp", None);

    let output = config.build(None).expect("build failed");
    let records = CompileCommandsEmitter::load(&output.compile_commands).unwrap();
    let new_main = root.join("src/module_v2.cpp");
    let old_main = root.join("src/module.cpp");
    assert_eq!(records.iter().filter(|r| r.file == new_main).count(), 1);
    assert_eq!(records.last().unwrap().file, new_main);
    assert!(records.iter().all(|r| r.file != old_main));
    assert_eq!(records.len(), 3);
}

#[test]
fn test_removed_file_leaves_the_archive() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("shrink");
    let root = project.path();
    write_aged(&root.join("src/extra.cpp"), "int extra_value() { return 7; }\n");
    let mut config = configure("shrink", root);
    config.add_files(&["src/extra.cpp"], None, None);
    config.build(None).expect("initial build failed");

    config.remove_files(&["extra.cpp"], Some(Path::new("src")));
    let rebuilt = config.build(None).expect("rebuild failed");
    assert!(rebuilt.compiled.is_empty(), "remaining objects are current");
    assert!(rebuilt.linked, "a smaller member set forces a relink");
    assert_eq!(rebuilt.records.len(), 3);

    let archive = root.join("build/libobjs-static3.test.a");
    if let Ok(listing) = Command::new("ar").arg("t").arg(&archive).output() {
        let members = String::from_utf8_lossy(&listing.stdout).to_string();
        assert!(members.contains("a.cpp.o"));
        assert!(!members.contains("extra.cpp.o"), "stale member kept: {}", members);
    }
}

#[test]
fn test_unresolved_symbol_fails_the_build() {
    if !have_gxx() || cfg!(target_os = "macos") {
        println!("Skipping test: g++ with GNU ld not available");
        return;
    }
    let project = create_test_project("undef");
    let root = project.path();
    write_aged(
        &root.join("src/module.cpp"),
        "int never_defined_anywhere();\nextern \"C\" int PyInit_undef() { return never_defined_anywhere(); }\n",
    );
    let mut config = configure("undef", root);

    match config.build(None) {
        Err(BuildError::Link(failure)) => {
            assert!(failure.output.contains("never_defined_anywhere"));
            assert!(failure.command.contains("--no-undefined"));
        }
        other => panic!("expected a link failure, got {:?}", other),
    }
    assert!(!root.join("build/undef.so").exists());
    assert!(!root.join(COMPILE_COMMANDS_FILE).exists());
}

#[test]
fn test_same_named_external_sources_both_link() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("twins");
    let root = project.path();
    let outside = tempfile::tempdir().unwrap();
    let x = outside.path().join("x/util.cpp");
    let y = outside.path().join("y/util.cpp");
    write_aged(&x, "int from_x() { return 1; }\n");
    write_aged(&y, "int from_y() { return 2; }\n");
    write_aged(
        &root.join("src/module.cpp"),
        "int from_x();\nint from_y();\nextern \"C\" int PyInit_twins() { return from_x() + from_y(); }\n",
    );
    let mut config = configure("twins", root);
    config.add_files(&[x.clone(), y.clone()], None, None);

    let output = config.build(None).expect("build with external sources failed");
    let object_of = |source: &Path| {
        output
            .records
            .iter()
            .find(|r| r.file.as_path() == source)
            .map(|r| r.output.clone())
            .unwrap()
    };
    let (x_obj, y_obj) = (object_of(&x), object_of(&y));
    assert_ne!(x_obj, y_obj);
    assert!(x_obj.exists() && y_obj.exists());
    assert!(x_obj.starts_with(root.join("build/objs3.test/_external")));
}

#[test]
fn test_detect_sees_project_version() {
    if !have_gxx() {
        println!("Skipping test: g++ not available");
        return;
    }
    let project = create_test_project("versioned");
    let root = project.path();
    write_aged(
        &root.join("include/version_gate.h"),
        "#pragma once\n#if PROJ_MAJOR_VERSION != 2\n#error unexpected project version\n#endif\n",
    );
    let mut config = configure("versioned", root);
    config.version = Some("2.0.0".to_string());
    assert!(config.detect("version_gate.h", None, &[Macro::new("HAVE_GATE", None)]));
    assert!(config.macros.contains("HAVE_GATE"));

    config.version = Some("3.1.0".to_string());
    assert!(!config.detect("version_gate.h", None, &[]));
}
