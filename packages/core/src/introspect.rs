//! Serializable descriptions of interfaces and nodes.
//!
//! Transports use these to publish metadata about what an address offers.

use ipctree_variant::VariantType;
use serde::Serialize;

/// One named argument or result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub inputs: Vec<ArgInfo>,
    pub outputs: Vec<ArgInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub readable: bool,
    pub writeable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalInfo {
    pub name: String,
    pub args: Vec<ArgInfo>,
}

/// Everything an interface declares, in name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub functions: Vec<FunctionInfo>,
    pub properties: Vec<PropertyInfo>,
    pub signals: Vec<SignalInfo>,
}

/// What a transport publishes for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub address: String,
    pub interfaces: Vec<InterfaceInfo>,
    /// Last address component of each direct child.
    pub children: Vec<String>,
}

pub(crate) fn args(names: &[String], types: &[VariantType]) -> Vec<ArgInfo> {
    names
        .iter()
        .zip(types)
        .map(|(name, ty)| ArgInfo {
            name: name.clone(),
            variant_type: ty.clone(),
        })
        .collect()
}
