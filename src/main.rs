use protodrill::entry;
use protodrill::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
