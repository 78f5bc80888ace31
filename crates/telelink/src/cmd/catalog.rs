use crate::cmd::{resolve_message, CatalogArgs, Context};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_catalog;

pub fn run(args: CatalogArgs, ctx: &Context) -> CliResult<i32> {
    let descriptors = match &args.message {
        Some(selector) => vec![resolve_message(&ctx.registry, selector)?],
        None => ctx.registry.descriptors(),
    };

    print_catalog(&descriptors, ctx.format);
    Ok(SUCCESS)
}
