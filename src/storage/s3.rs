use anyhow::Result;
use opendal::Operator;

/// 构建 S3 operator，返回 (operator, 显示名称)
pub fn build_operator(
    bucket: &str,
    region: &str,
    access_key: &str,
    secret_key: &str,
    endpoint: Option<&str>,
    prefix: Option<&str>,
) -> Result<(Operator, String)> {
    use opendal::services::S3;

    let mut builder = S3::default()
        .bucket(bucket)
        .region(region)
        .access_key_id(access_key)
        .secret_access_key(secret_key);

    if let Some(ep) = endpoint {
        builder = builder.endpoint(ep);
    }

    if let Some(p) = prefix {
        builder = builder.root(p);
    }

    let operator = Operator::new(builder)?.finish();

    let name = format!(
        "s3://{}{}",
        bucket,
        prefix.map(|p| format!("/{}", p)).unwrap_or_default()
    );

    Ok((operator, name))
}
