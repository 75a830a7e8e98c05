//! 投票层：答案集、计票数据模型与投票引擎

pub mod engine;
pub mod types;

pub use engine::{VotingEngine, RANK_PARSE_FAILED};
pub use types::{
    AnswerEntry, AnswerSet, PluralityBallot, RankedBallot, Tally, TallyEntry, VoteMethod,
    VoteResult,
};
