//! Serializable overview of a module

use serde::Serialize;

use irk_common::AttributeIndex;

use crate::arena::HandleArena;
use crate::error::Result;
use crate::handles::{ContextId, FunctionId};
use crate::printer::format_type;
use crate::verify::VerificationState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub module: String,
    pub functions: Vec<FunctionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub signature: String,
    pub call_convention: u32,
    pub parameters: u32,
    pub blocks: Vec<BlockSummary>,
    pub function_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub name: String,
    pub instructions: usize,
}

impl ModuleSummary {
    pub fn collect(arena: &HandleArena, context: ContextId) -> Result<Self> {
        let functions = arena
            .functions_in(context)?
            .into_iter()
            .map(|function| FunctionSummary::collect(arena, function))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { module: arena.module_name(context)?.to_string(), functions })
    }

    /// True when every function has been verified and none is invalid
    pub fn is_verified(&self) -> bool {
        self.functions.iter().all(|function| function.state == "verified")
    }
}

impl FunctionSummary {
    fn collect(arena: &HandleArena, function: FunctionId) -> Result<Self> {
        let body = arena.function(function)?;
        let blocks = body
            .blocks
            .iter()
            .map(|&block| {
                arena.block(block).map(|data| BlockSummary {
                    name: data.name.clone(),
                    instructions: data.instructions.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let personality = match body.personality {
            Some(personality) => Some(arena.function_name(personality)?.to_string()),
            None => None,
        };
        let (state, reasons) = match &body.state {
            VerificationState::Unverified => ("unverified", Vec::new()),
            VerificationState::Verified => ("verified", Vec::new()),
            VerificationState::Invalid(reasons) => ("invalid", reasons.clone()),
        };

        Ok(Self {
            name: arena.function_name(function)?.to_string(),
            signature: format_type(arena, body.signature)?,
            call_convention: body.call_convention,
            parameters: body.params.len() as u32,
            blocks,
            function_attributes: body.attributes_at(AttributeIndex::Function).map(ToString::to_string).collect(),
            gc: body.gc.clone(),
            personality,
            state: state.to_string(),
            reasons,
        })
    }
}
