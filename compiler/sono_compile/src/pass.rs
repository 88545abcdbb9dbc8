//! The fixed pass order.

use std::fmt;

/// The twelve pipeline stages, in the only order they ever run.
///
/// A compiler instance is non-reentrant: one unit goes through all
/// stages (or fails) before the next is accepted. Editor-time
/// validation short-circuits after [`Pass::TypeCheck`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub enum Pass {
    Parsing,
    ComplexTypeParsing,
    DataAllocation,
    DataInitialisation,
    PreSymbolOptimization,
    ResolvingSymbols,
    TypeCheck,
    PostSymbolOptimization,
    FunctionTemplateParsing,
    FunctionParsing,
    FunctionCompilation,
    RootConstructorExecution,
}

impl Pass {
    pub const ALL: [Pass; 12] = [
        Pass::Parsing,
        Pass::ComplexTypeParsing,
        Pass::DataAllocation,
        Pass::DataInitialisation,
        Pass::PreSymbolOptimization,
        Pass::ResolvingSymbols,
        Pass::TypeCheck,
        Pass::PostSymbolOptimization,
        Pass::FunctionTemplateParsing,
        Pass::FunctionParsing,
        Pass::FunctionCompilation,
        Pass::RootConstructorExecution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::Parsing => "Parsing",
            Pass::ComplexTypeParsing => "ComplexTypeParsing",
            Pass::DataAllocation => "DataAllocation",
            Pass::DataInitialisation => "DataInitialisation",
            Pass::PreSymbolOptimization => "PreSymbolOptimization",
            Pass::ResolvingSymbols => "ResolvingSymbols",
            Pass::TypeCheck => "TypeCheck",
            Pass::PostSymbolOptimization => "PostSymbolOptimization",
            Pass::FunctionTemplateParsing => "FunctionTemplateParsing",
            Pass::FunctionParsing => "FunctionParsing",
            Pass::FunctionCompilation => "FunctionCompilation",
            Pass::RootConstructorExecution => "RootConstructorExecution",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_fixed() {
        let mut prev = Pass::ALL[0];
        for pass in &Pass::ALL[1..] {
            assert!(prev < *pass, "{prev} must run before {pass}");
            prev = *pass;
        }
        assert_eq!(Pass::ALL.len(), 12);
    }
}
