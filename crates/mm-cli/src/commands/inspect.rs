use mm_config::MadmallConfig;
use mm_migrate::{ColumnInfo, DataSource, SqliteDataSource};
use serde::Serialize;

use crate::cli::{InspectArgs, OutputFormat};
use crate::output::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub name: String,
    pub row_count: u64,
    pub columns: Vec<ColumnInfo>,
}

pub async fn handle(
    args: &InspectArgs,
    config: &MadmallConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = config.source_path(args.source.as_deref())?;
    anyhow::ensure!(path.exists(), "source database {} does not exist", path.display());

    let source = SqliteDataSource::new(path);
    source.connect().await?;
    let report = inspect(&source).await;
    source.disconnect().await?;

    output(&report?, format)
}

pub async fn inspect(source: &SqliteDataSource) -> anyhow::Result<Vec<TableReport>> {
    let mut tables = Vec::new();
    for name in source.table_names().await? {
        tables.push(TableReport {
            row_count: source.get_row_count(&name).await?,
            columns: source.table_schema(&name).await?,
            name,
        });
    }
    Ok(tables)
}
