//! Build-description instrumentation.
//!
//! The generated block enumerates every declared target, keeps executables
//! and libraries, forces unoptimized debuggable IR for them and attaches an
//! extract-bitcode target plus a `<target>_hydrogit` link target to each.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{HydrogitError, Result};
use crate::language::Language;
use crate::naming::TargetName;

/// First line of the injected block; its presence means the file is already instrumented.
pub const INSTRUMENTATION_MARKER: &str = "#==========LLVM IR generation";

/// A build system whose description can be extended with IR targets.
pub trait BuildDescription {
    /// File name of the description, e.g. `CMakeLists.txt`.
    fn file_name(&self) -> &'static str;

    /// Block appended to the description.
    fn instrumentation(&self, helper_dir: &Path, language: Language) -> String;

    /// Directory the configure step fills with one entry per derived target.
    fn ir_output_dir(&self, build_dir: &Path) -> PathBuf;

    /// Names of the `_hydrogit` targets the configure step generated.
    fn meta_targets(&self, build_dir: &Path) -> Result<Vec<String>> {
        let ir_dir = self.ir_output_dir(build_dir);
        let mut targets = Vec::new();
        for entry in fs::read_dir(&ir_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if TargetName::from_tagged(name).is_some() {
                    targets.push(name.to_string());
                }
            }
        }
        targets.sort();
        Ok(targets)
    }
}

/// CMake, driven through the `llvm-ir-cmake-utils` helper module.
pub struct CMakeDescription;

impl BuildDescription for CMakeDescription {
    fn file_name(&self) -> &'static str {
        "CMakeLists.txt"
    }

    fn instrumentation(&self, helper_dir: &Path, language: Language) -> String {
        let lang = language.cmake_name();
        let helper = helper_dir.display().to_string().replace('\\', "/");
        let link_target = TargetName::new("${_target}").tagged();
        format!(
            r#"
{INSTRUMENTATION_MARKER}
list(APPEND CMAKE_MODULE_PATH "{helper}")
include(LLVMIRUtil)
enable_language({lang})
get_directory_property(_allTargets BUILDSYSTEM_TARGETS)
foreach(_target ${{_allTargets}})
    get_target_property(_type ${{_target}} TYPE)
    message(STATUS "Hydrogit saw target ${{_target}} type ${{_type}}")
    if((_type STREQUAL "EXECUTABLE") OR (_type STREQUAL "STATIC_LIBRARY") OR (_type STREQUAL "SHARED_LIBRARY"))
        message(STATUS "Hydrogit adding IR for target ${{_target}} type ${{_type}}")
        set_target_properties(${{_target}} PROPERTIES LINKER_LANGUAGE {lang})
        add_compile_options(-c -O0 -Xclang -disable-O0-optnone -g -emit-llvm -S)
        llvmir_attach_bc_target(${{_target}}_bc ${{_target}})
        add_dependencies(${{_target}}_bc ${{_target}})
        llvmir_attach_link_target({link_target} ${{_target}}_bc -S)
    endif()
endforeach(_target ${{_allTargets}})
# end LLVM IR generation
#==========
"#
        )
    }

    fn ir_output_dir(&self, build_dir: &Path) -> PathBuf {
        build_dir.join("llvm-ir")
    }
}

/// Appends the instrumentation block to `path` unless it is already there.
///
/// Returns whether the file was changed. Existing content is never rewritten.
pub fn instrument(
    description: &dyn BuildDescription,
    path: &Path,
    helper_dir: &Path,
    language: Language,
) -> Result<bool> {
    if !path.is_file() {
        return Err(HydrogitError::Build(format!(
            "{} not found in {}",
            description.file_name(),
            path.display()
        )));
    }

    let existing = fs::read_to_string(path)?;
    if existing.contains(INSTRUMENTATION_MARKER) {
        debug!("{} already instrumented", path.display());
        return Ok(false);
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(description.instrumentation(helper_dir, language).as_bytes())?;
    info!("Instrumented {}", path.display());
    Ok(true)
}
