//! Downloads the resources a [`DatasetDefinition`] names.
//!
//! Each dataset is resolved once through CKAN `package_show`, then every
//! listed resource is downloaded into [`FetchOptions::raw_dir`] under the
//! file name the definition gives it. With
//! [`FetchOptions::skip_fetch`] set, previously downloaded files are reused
//! and nothing touches the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ckan::{CkanResource, find_resource, package_show};
use crate::progress::ProgressCallback;
use crate::source_def::{DatasetDefinition, DatasetKind, WorkbookResource};
use crate::{FetchOptions, SourceError, archive, retry};

/// A workbook on local disk and the definition it was fetched for.
#[derive(Debug, Clone)]
pub struct DownloadedWorkbook {
    pub resource: WorkbookResource,
    pub path: PathBuf,
}

/// Ward boundary files on local disk.
#[derive(Debug, Clone)]
pub struct DownloadedWards {
    /// The `.shp` or `.geojson` file to load.
    pub geometry_path: PathBuf,
    /// Attribute holding the ward name.
    pub name_field: String,
}

/// Downloads every workbook of an energy dataset.
///
/// # Errors
///
/// Returns [`SourceError`] if the dataset is not a workbook dataset, a
/// listed resource is not published, or a download fails after retries.
pub async fn fetch_energy_workbooks(
    client: &reqwest::Client,
    dataset: &DatasetDefinition,
    options: &FetchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<DownloadedWorkbook>, SourceError> {
    let DatasetKind::EnergyWorkbooks { resources } = &dataset.kind else {
        return Err(SourceError::Normalization {
            message: format!("dataset '{}' is not an energy workbook dataset", dataset.id),
        });
    };

    progress.set_total(resources.len() as u64);

    let published = if options.skip_fetch {
        Vec::new()
    } else {
        package_show(client, &dataset.ckan.base_url, &dataset.ckan.package_id).await?
    };

    let mut downloaded = Vec::with_capacity(resources.len());
    for resource in resources {
        progress.set_message(resource.file_name.clone());
        let path = ensure_resource(
            client,
            dataset,
            &published,
            &resource.resource,
            &resource.file_name,
            options,
        )
        .await?;
        downloaded.push(DownloadedWorkbook {
            resource: resource.clone(),
            path,
        });
        progress.inc(1);
    }

    progress.finish(format!("{} workbooks ready", downloaded.len()));
    Ok(downloaded)
}

/// Downloads the ward boundary resource and unpacks it if zipped.
///
/// # Errors
///
/// Returns [`SourceError`] if the dataset is not a ward dataset, the
/// download fails, or the archive contains no `.shp` file.
pub async fn fetch_ward_boundaries(
    client: &reqwest::Client,
    dataset: &DatasetDefinition,
    options: &FetchOptions,
) -> Result<DownloadedWards, SourceError> {
    let DatasetKind::WardBoundaries {
        resource,
        file_name,
        name_field,
    } = &dataset.kind
    else {
        return Err(SourceError::Normalization {
            message: format!("dataset '{}' is not a ward boundary dataset", dataset.id),
        });
    };

    let published = if options.skip_fetch {
        Vec::new()
    } else {
        package_show(client, &dataset.ckan.base_url, &dataset.ckan.package_id).await?
    };

    let path = ensure_resource(client, dataset, &published, resource, file_name, options).await?;

    let geometry_path = if has_extension(&path, "zip") {
        archive::extract_zip(&path, &options.wards_dir)?;
        archive::find_with_extension(&options.wards_dir, "shp")?.ok_or_else(|| {
            SourceError::MissingResource {
                dataset: dataset.id.clone(),
                resource: format!("{file_name} (no .shp inside)"),
            }
        })?
    } else {
        path
    };

    Ok(DownloadedWards {
        geometry_path,
        name_field: name_field.clone(),
    })
}

/// Returns the local path of a resource, downloading it unless
/// `skip_fetch` is set.
async fn ensure_resource(
    client: &reqwest::Client,
    dataset: &DatasetDefinition,
    published: &[CkanResource],
    wanted: &str,
    file_name: &str,
    options: &FetchOptions,
) -> Result<PathBuf, SourceError> {
    let dest = options.raw_dir.join(file_name);

    if options.skip_fetch {
        if dest.is_file() {
            log::info!("Reusing {}", dest.display());
            return Ok(dest);
        }
        return Err(SourceError::MissingResource {
            dataset: dataset.id.clone(),
            resource: dest.display().to_string(),
        });
    }

    let resource =
        find_resource(published, wanted).ok_or_else(|| SourceError::MissingResource {
            dataset: dataset.id.clone(),
            resource: wanted.to_string(),
        })?;

    log::info!("Downloading '{}' from {}", resource.name, resource.url);
    let bytes = retry::send_bytes(|| client.get(&resource.url)).await?;

    std::fs::create_dir_all(&options.raw_dir)?;
    std::fs::write(&dest, &bytes)?;

    #[allow(clippy::cast_precision_loss)]
    let kb = bytes.len() as f64 / 1024.0;
    log::info!("  -> {} ({kb:.1} KB)", dest.display());

    Ok(dest)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
