//! Compiler configuration.

use bitflags::bitflags;
use sono_diagnostic::ReportFormat;

bitflags! {
    /// Individually toggleable tree rewrites, consulted by the two
    /// optimization stages and by inliner expansion.
    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    pub struct OptimizationFlags: u8 {
        const CONSTANT_FOLDING = 1 << 0;
        const SIMPLIFICATION   = 1 << 1;
        const DEAD_CODE        = 1 << 2;
        const INLINING         = 1 << 3;
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        OptimizationFlags::all()
    }
}

/// Host-supplied configuration for one compiler instance.
#[derive(Clone, Debug)]
pub struct CompilerSettings {
    pub optimizations: OptimizationFlags,
    pub report_format: ReportFormat,
    /// Bound on recursive inliner expansion. The rewrite a high-level
    /// inliner produces may itself contain inlinable calls; expansion
    /// past this depth is a compile error at the original call site.
    pub max_inline_depth: u32,
    /// Bound on transitively triggered template instantiation.
    pub max_template_depth: u32,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            optimizations: OptimizationFlags::default(),
            report_format: ReportFormat::default(),
            max_inline_depth: 32,
            max_template_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let settings = CompilerSettings::default();
        assert!(settings.optimizations.contains(OptimizationFlags::INLINING));
        assert!(settings.max_inline_depth > 0);
    }
}
