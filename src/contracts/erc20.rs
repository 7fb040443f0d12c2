use ethers::prelude::abigen;

abigen!(
    Erc20,
    r#"[
        function symbol() external view returns (string)
    ]"#
);
