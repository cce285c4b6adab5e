use clap::Parser;

use crate::error::{AppError, AppResult};

use super::PullArgs;

pub(crate) fn parse_test_args<I, T>(args: I) -> AppResult<PullArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    PullArgs::try_parse_from(args).map_err(AppError::from)
}
