//! The `base` recipe used across the test suite.
//!
//! `base` is a library with the usual platform-sensitive options, four
//! header-propagating requirements and two option-gated test requirements.

use std::path::Path;

use crate::core::dependency::{parse_exact_version, Activation, Dependency};
use crate::core::option::{OptionDecl, OptionModel};
use crate::core::platform::Os;
use crate::core::recipe::{LifecycleHooks, PackageIdentity, PackageKind, Recipe, TestPackage};
use crate::resolver::database::PackageInfo;
use crate::resolver::store::LocalPackageStore;
use crate::test_support::MemoryDatabase;

/// Every package `base` can depend on, as `(name, version)`.
pub const BASE_DEPENDENCIES: [(&str, &str); 6] = [
    ("spdlog", "1.15.3"),
    ("tomlplusplus", "3.4.0"),
    ("asio", "1.34.2"),
    ("nlohmann_json", "3.11.3"),
    ("gtest", "1.16.0"),
    ("benchmark", "1.9.1"),
];

pub fn base_options() -> OptionModel {
    OptionModel::new(vec![
        OptionDecl::boolean("shared", false).variable("BUILD_SHARED_LIBS"),
        OptionDecl::boolean("fPIC", true)
            .variable("CMAKE_POSITION_INDEPENDENT_CODE")
            .unsupported_on(Os::Windows)
            .removed_when("shared"),
        OptionDecl::boolean("enable_tests", true).variable("BUILD_TESTING"),
        OptionDecl::boolean("enable_benchmarks", true).variable("BUILD_BENCHMARK"),
        OptionDecl::boolean("enable_examples", true).variable("BUILD_EXAMPLE"),
        OptionDecl::boolean("enable_docs", false).variable("BUILD_DOCS"),
    ])
    .expect("base options are valid")
}

/// The `base/1.0.0` recipe rooted at `root`.
pub fn base_recipe_at(root: &Path) -> Recipe {
    let version = |v: &str| parse_exact_version(v).expect("fixture version");

    let mut recipe = Recipe::new(
        PackageIdentity::new("base", version("1.0.0"), PackageKind::Library),
        root,
    )
    .with_description("Shared infrastructure for the service stack")
    .with_license("MIT")
    .with_options(base_options())
    .with_libs(["base"])
    .with_hooks(LifecycleHooks {
        test_binary: Some("base_tests".to_string()),
        ..LifecycleHooks::default()
    })
    .with_test_package(TestPackage::default());

    for (name, v) in &BASE_DEPENDENCIES[..4] {
        recipe = recipe.with_dependency(Dependency::new(*name, version(v)).with_transitive_headers(true));
    }
    recipe
        .with_dependency(
            Dependency::test("gtest", version("1.16.0")).with_activation(Activation::when("enable_tests")),
        )
        .with_dependency(
            Dependency::test("benchmark", version("1.9.1"))
                .with_activation(Activation::when("enable_benchmarks")),
        )
}

pub fn base_recipe() -> Recipe {
    base_recipe_at(Path::new("/src/base"))
}

/// A database holding every dependency `base` declares.
pub fn base_database() -> MemoryDatabase {
    BASE_DEPENDENCIES
        .iter()
        .fold(MemoryDatabase::new(), |db, (name, version)| db.with_package(name, version))
}

/// Install `package.json` for every `base` dependency into `store`.
pub fn seed_store(store: &LocalPackageStore) {
    for (name, version) in BASE_DEPENDENCIES {
        let mut info = PackageInfo::new(name, parse_exact_version(version).expect("fixture version"));
        info.libs = vec![name.to_string()];
        store.write_info(&info).expect("seed store");
    }
}
