pub mod chord;
pub mod corpus;
