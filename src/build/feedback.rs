use colored::*;

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Module entry point missing
        if output.contains("PyInit_") && (output.contains("undefined") || output.contains("LNK"))
        {
            return Some(format!(
                "The module entry point {} was not found.\nMake sure the main file defines it and the module name matches {}.",
                "PyInit_<name>".bold().yellow(),
                "[project].name".bold().green()
            ));
        }

        // 2. Missing library (linker)
        if output.contains("LNK1181")
            || output.contains("cannot find -l")
            || output.contains("library not found for -l")
        {
            return Some(format!(
                "A library needed by the {} could not be found.\nCheck {} and {} in pyproject.toml, or the libraries added by feature detection.",
                "linker".bold().red(),
                "libs".bold().yellow(),
                "lib_dirs".bold().yellow()
            ));
        }

        // 3. Unresolved symbols
        if output.contains("LNK2019") || output.contains("undefined reference to") {
            return Some(format!(
                "It looks like an {} error.\nYou might be missing a library in {}.",
                "unresolved symbol".bold().red(),
                "[tool.cxxpy].libs".bold().yellow()
            ));
        }

        // 4. Missing header
        if output.contains("fatal error: ") && output.contains("No such file or directory")
            || output.contains("cannot open include file")
            || output.contains("C1083")
        {
            return Some(format!(
                "It looks like a {} error.\nYou might be missing an include path.\nCheck {} in pyproject.toml.",
                "Missing Header".bold().red(),
                "include_dirs".bold().yellow()
            ));
        }

        None
    }
}
