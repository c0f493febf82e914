pub mod local;
pub mod member;
pub mod view;

pub use local::{InboundQuery, LocalView, MeshHub};
pub use member::{Member, MemberStatus};
pub use view::{ClusterView, NodeResponse, QueryHandle, QueryParams};
