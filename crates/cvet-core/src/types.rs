use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Void,
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Pointer(Box<CType>),
    Array(Box<CType>, Option<usize>),
    Struct(StructId),
    Union(StructId),
    Enum(EnumId),
    Function(Box<FunctionType>),
    Abstract(AbstractId),
    Unknown,
}

impl CType {
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            CType::Bool
                | CType::Char
                | CType::UChar
                | CType::Short
                | CType::UShort
                | CType::Int
                | CType::UInt
                | CType::Long
                | CType::ULong
                | CType::LongLong
                | CType::ULongLong
                | CType::Enum(_)
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, CType::Float | CType::Double)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CType::Unknown)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            CType::UChar | CType::UShort | CType::UInt | CType::ULong | CType::ULongLong
        )
    }

    /// Rank used by the usual arithmetic conversions.
    fn rank(&self) -> u8 {
        match self {
            CType::Bool => 0,
            CType::Char | CType::UChar => 1,
            CType::Short | CType::UShort => 2,
            CType::Int | CType::UInt | CType::Enum(_) => 3,
            CType::Long | CType::ULong => 4,
            CType::LongLong | CType::ULongLong => 5,
            CType::Float => 6,
            CType::Double => 7,
            _ => 0,
        }
    }

    /// Integer promotion: everything below int widens to int.
    pub fn promote(&self) -> CType {
        match self {
            CType::Bool | CType::Char | CType::UChar | CType::Short | CType::UShort => CType::Int,
            CType::Enum(_) => CType::Int,
            CType::Float => CType::Double,
            other => other.clone(),
        }
    }

    /// Usual arithmetic conversions for a binary arithmetic operator.
    pub fn usual_arith(&self, other: &CType) -> CType {
        if self.is_unknown() || other.is_unknown() {
            return CType::Unknown;
        }

        let a = self.promote();
        let b = other.promote();

        if a == b {
            return a;
        }

        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }

    /// Arrays decay to pointers in expression context.
    pub fn decay(&self) -> CType {
        match self {
            CType::Array(elem, _) => CType::Pointer(elem.clone()),
            other => other.clone(),
        }
    }

    pub fn pointee(&self) -> Option<&CType> {
        match self {
            CType::Pointer(inner) => Some(inner),
            CType::Array(inner, _) => Some(inner),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&CType> {
        match self {
            CType::Array(inner, _) => Some(inner),
            CType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            CType::Void => 0,
            CType::Bool | CType::Char | CType::UChar => 1,
            CType::Short | CType::UShort => 2,
            CType::Int | CType::UInt | CType::Float | CType::Enum(_) => 4,
            CType::Long
            | CType::ULong
            | CType::LongLong
            | CType::ULongLong
            | CType::Double
            | CType::Pointer(_)
            | CType::Function(_) => 8,
            CType::Array(elem, Some(n)) => elem.size_bytes() * n,
            CType::Array(_, None) => 8,
            CType::Struct(_) | CType::Union(_) | CType::Abstract(_) | CType::Unknown => 0,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Bool => write!(f, "bool"),
            CType::Char => write!(f, "char"),
            CType::UChar => write!(f, "unsigned char"),
            CType::Short => write!(f, "short"),
            CType::UShort => write!(f, "unsigned short"),
            CType::Int => write!(f, "int"),
            CType::UInt => write!(f, "unsigned int"),
            CType::Long => write!(f, "long"),
            CType::ULong => write!(f, "unsigned long"),
            CType::LongLong => write!(f, "long long"),
            CType::ULongLong => write!(f, "unsigned long long"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::Pointer(inner) => write!(f, "{} *", inner),
            CType::Array(elem, Some(n)) => write!(f, "{}[{}]", elem, n),
            CType::Array(elem, None) => write!(f, "{}[]", elem),
            CType::Struct(id) => write!(f, "struct#{}", id.0),
            CType::Union(id) => write!(f, "union#{}", id.0),
            CType::Enum(id) => write!(f, "enum#{}", id.0),
            CType::Function(ft) => write!(f, "function{}", ft),
            CType::Abstract(id) => write!(f, "abstract#{}", id.0),
            CType::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<CType>,
    pub returns: CType,
    pub variadic: bool,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({}) -> {}", params, self.returns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbstractId(pub u32);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    pub structs: IndexMap<StructId, StructDefinition>,
    pub enums: IndexMap<EnumId, EnumDefinition>,
    pub abstracts: IndexMap<AbstractId, AbstractDefinition>,
    next_struct_id: u32,
    next_enum_id: u32,
    next_abstract_id: u32,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_struct(&mut self, def: StructDefinition) -> StructId {
        let id = StructId(self.next_struct_id);
        self.next_struct_id += 1;
        self.structs.insert(id, def);
        id
    }

    pub fn add_enum(&mut self, def: EnumDefinition) -> EnumId {
        let id = EnumId(self.next_enum_id);
        self.next_enum_id += 1;
        self.enums.insert(id, def);
        id
    }

    pub fn add_abstract(&mut self, def: AbstractDefinition) -> AbstractId {
        let id = AbstractId(self.next_abstract_id);
        self.next_abstract_id += 1;
        self.abstracts.insert(id, def);
        id
    }

    pub fn enum_by_name(&self, name: &str) -> Option<EnumId> {
        self.enums
            .iter()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| *id)
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructId> {
        self.structs
            .iter()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| *id)
    }

    pub fn abstract_by_name(&self, name: &str) -> Option<AbstractId> {
        self.abstracts
            .iter()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| *id)
    }

    /// The enum that declares `member`, if any.
    pub fn enum_of_member(&self, member: &str) -> Option<EnumId> {
        self.enums
            .iter()
            .find(|(_, def)| def.members.iter().any(|m| m == member))
            .map(|(id, _)| *id)
    }

    pub fn field_type(&self, ty: &CType, field: &str) -> Option<CType> {
        let id = match ty {
            CType::Struct(id) | CType::Union(id) => *id,
            _ => return None,
        };

        self.structs.get(&id).and_then(|def| {
            def.fields
                .iter()
                .find(|f| f.name == field)
                .map(|f| f.field_type.clone())
        })
    }

    /// A type is mutable if writing through a shared reference to it can be observed: pointers,
    /// arrays, structs containing them, and abstract types declared mutable.
    pub fn is_mutable(&self, ty: &CType) -> bool {
        match ty {
            CType::Pointer(_) | CType::Array(_, _) => true,
            CType::Struct(id) | CType::Union(id) => self
                .structs
                .get(id)
                .map(|def| def.fields.iter().any(|f| self.is_mutable(&f.field_type)))
                .unwrap_or(false),
            CType::Abstract(id) => self
                .abstracts
                .get(id)
                .map(|def| def.mutable)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_abstract(&self, ty: &CType) -> bool {
        matches!(ty, CType::Abstract(_))
    }

    /// Whether `actual` is acceptable where `expected` is required, with the literal-zero
    /// pointer exemption applied by callers that know the actual is a zero literal.
    pub fn match_types(&self, expected: &CType, actual: &CType) -> bool {
        let expected = expected.decay();
        let actual = actual.decay();

        if expected.is_unknown() || actual.is_unknown() {
            return true;
        }

        if expected == actual {
            return true;
        }

        match (&expected, &actual) {
            (a, b) if a.is_arithmetic() && b.is_arithmetic() => {
                // enum/bool mixing is checked separately by the comparison policy
                !(matches!(a, CType::Enum(_)) ^ matches!(b, CType::Enum(_)))
                    || a.promote() == b.promote()
            }
            (CType::Pointer(p), CType::Pointer(q)) => self.pointee_match(p, q),
            _ => false,
        }
    }

    /// Pointee compatibility is identity, not arithmetic convertibility; `int*` does not
    /// accept `double*`. A void pointee is the wildcard.
    fn pointee_match(&self, a: &CType, b: &CType) -> bool {
        if a.is_unknown() || b.is_unknown() {
            return true;
        }
        if matches!(a, CType::Void) || matches!(b, CType::Void) {
            return true;
        }
        match (a, b) {
            (CType::Pointer(p), CType::Pointer(q)) => self.pointee_match(p, q),
            _ => a == b,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<StructFieldDef>,
    pub is_union: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructFieldDef {
    pub name: String,
    pub field_type: CType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractDefinition {
    pub name: String,
    pub mutable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usual_arith_widens() {
        assert_eq!(CType::Char.usual_arith(&CType::Int), CType::Int);
        assert_eq!(CType::Int.usual_arith(&CType::Double), CType::Double);
        assert_eq!(CType::UInt.usual_arith(&CType::Long), CType::Long);
    }

    #[test]
    fn test_array_decay() {
        let arr = CType::Array(Box::new(CType::Char), Some(16));
        assert_eq!(arr.decay(), CType::Pointer(Box::new(CType::Char)));
    }

    #[test]
    fn test_void_pointer_matches_any_pointer() {
        let reg = TypeRegistry::new();
        let vp = CType::Pointer(Box::new(CType::Void));
        let ip = CType::Pointer(Box::new(CType::Int));
        assert!(reg.match_types(&vp, &ip));
        assert!(reg.match_types(&ip, &vp));
        assert!(!reg.match_types(&ip, &CType::Pointer(Box::new(CType::Double))));
    }

    #[test]
    fn test_pointee_must_match_exactly() {
        let reg = TypeRegistry::new();
        let ip = CType::Pointer(Box::new(CType::Int));
        let cp = CType::Pointer(Box::new(CType::Char));
        assert!(reg.match_types(&ip, &ip));
        assert!(!reg.match_types(&ip, &cp));

        // int may widen to long, but int* does not convert to long*
        assert!(reg.match_types(&CType::Int, &CType::Long));
        assert!(!reg.match_types(&ip, &CType::Pointer(Box::new(CType::Long))));

        // the void wildcard applies at every pointer level
        let ipp = CType::Pointer(Box::new(ip.clone()));
        let vpp = CType::Pointer(Box::new(CType::Pointer(Box::new(CType::Void))));
        assert!(reg.match_types(&ipp, &vpp));
    }
}
